use crate::model::fs::FSError;

/// Canonical form of a logical path: `/`-separated, no leading or trailing
/// separator, no `.` or empty segments, `..` resolved.
pub fn normalize(path: &str) -> Result<String, FSError> {
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(FSError::InvalidPath(path.to_string()));
                }
            }
            s => parts.push(s),
        }
    }

    Ok(parts.join("/"))
}

/// Namespace prepended to every key sent to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    pub fn new(prefix: Option<&str>) -> Self {
        let prefix = match prefix {
            Some(p) => p.trim_end_matches(['/', '\\']),
            None => "",
        };

        if prefix.is_empty() {
            return PathPrefix::default();
        }

        PathPrefix {
            prefix: format!("{}/", prefix),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    pub fn apply(&self, path: &str) -> Result<String, FSError> {
        Ok(format!("{}{}", self.prefix, normalize(path)?))
    }

    pub fn remove(&self, key: &str) -> String {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key).to_string()
    }
}
