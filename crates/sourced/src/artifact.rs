use ini::Ini;
use serde_json::Value;

use crate::MergeError;

/// Artifact shapes that can be assembled from several fetched pages.
pub trait PageArtifact: Sized {
    /// Short type name used in merge errors.
    fn kind(&self) -> &'static str;

    /// An empty page ends placeholder pagination.
    fn is_empty_page(&self) -> bool;

    /// Append a later page to this artifact.
    fn append(&mut self, page: Self) -> Result<(), MergeError>;

    /// Rewrite the text form of the artifact.
    fn map_text(self, f: impl FnOnce(&str) -> String) -> Result<Self, MergeError> {
        let _ = f;
        Err(MergeError::NotText {
            artifact: self.kind(),
        })
    }
}

impl PageArtifact for String {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn is_empty_page(&self) -> bool {
        self.is_empty()
    }

    fn append(&mut self, page: Self) -> Result<(), MergeError> {
        self.push_str(&page);
        Ok(())
    }

    fn map_text(self, f: impl FnOnce(&str) -> String) -> Result<Self, MergeError> {
        Ok(f(&self))
    }
}

impl<T> PageArtifact for Vec<T> {
    fn kind(&self) -> &'static str {
        "list"
    }

    fn is_empty_page(&self) -> bool {
        self.is_empty()
    }

    fn append(&mut self, page: Self) -> Result<(), MergeError> {
        self.extend(page);
        Ok(())
    }
}

/// Arrays concatenate and strings join; every other pairing is rejected.
impl PageArtifact for Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn is_empty_page(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(flag) => !flag,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
        }
    }

    fn append(&mut self, page: Self) -> Result<(), MergeError> {
        match (self, page) {
            (Value::Array(items), Value::Array(more)) => {
                items.extend(more);
                Ok(())
            }
            (Value::String(text), Value::String(more)) => {
                text.push_str(&more);
                Ok(())
            }
            (artifact, page) => Err(MergeError::Incompatible {
                artifact: artifact.kind(),
                page: page.kind(),
            }),
        }
    }

    fn map_text(self, f: impl FnOnce(&str) -> String) -> Result<Self, MergeError> {
        match self {
            Value::String(text) => Ok(Value::String(f(&text))),
            other => Err(MergeError::NotText {
                artifact: other.kind(),
            }),
        }
    }
}

impl PageArtifact for Ini {
    fn kind(&self) -> &'static str {
        "ini"
    }

    fn is_empty_page(&self) -> bool {
        self.iter().all(|(_, props)| props.iter().next().is_none())
    }

    fn append(&mut self, _page: Self) -> Result<(), MergeError> {
        Err(MergeError::Unsupported { artifact: "ini" })
    }
}
