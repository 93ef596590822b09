pub mod mime;
pub mod object;
pub mod path;
pub mod poll;
pub mod time;
