//! bdfr post records.
//!
//! A post is kept as the ordered JSON object it was read from. Only the
//! body strings and the comment/reply arrays are interpreted; every other
//! field, and the order of all fields, is written back unchanged.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

const POST_BODY: &str = "selftext";
const POST_CHILDREN: &str = "comments";
const COMMENT_BODY: &str = "body";
const COMMENT_CHILDREN: &str = "replies";

/// A saved reddit submission and its comment tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Post {
    fields: Map<String, Value>,
}

/// Mutable view of one message body.
#[derive(Debug)]
pub struct BodyMut<'a> {
    /// Reddit id of the message the body belongs to.
    pub id: Option<&'a str>,
    pub text: &'a mut String,
}

impl Post {
    /// Reddit id of the post, if recorded.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    /// Every body in the post: the selftext, then comments and replies
    /// depth first in archive order. Null bodies are skipped.
    pub fn bodies_mut(&mut self) -> Vec<BodyMut<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![(&mut self.fields, POST_BODY, POST_CHILDREN)];

        while let Some((fields, body_key, children_key)) = stack.pop() {
            let mut id = None;
            let mut text = None;
            let mut children = None;

            for (key, value) in fields {
                if key == "id" {
                    id = Value::as_str(value);
                } else if key == body_key {
                    if let Value::String(s) = value {
                        text = Some(s);
                    }
                } else if key == children_key {
                    if let Value::Array(items) = value {
                        children = Some(items);
                    }
                }
            }

            if let Some(text) = text {
                out.push(BodyMut { id, text });
            }
            stack.extend(
                children
                    .into_iter()
                    .flat_map(|items| items.iter_mut().rev())
                    .filter_map(Value::as_object_mut)
                    .map(|comment| (comment, COMMENT_BODY, COMMENT_CHILDREN)),
            );
        }

        out
    }
}

impl TryFrom<Map<String, Value>> for Post {
    type Error = String;

    /// Accept an object whose bodies are strings (or null) and whose
    /// comment/reply fields are arrays of objects (or null), at any depth.
    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut stack = vec![(&fields, POST_BODY, POST_CHILDREN)];

        while let Some((object, body_key, children_key)) = stack.pop() {
            match object.get(body_key) {
                None | Some(Value::Null | Value::String(_)) => {}
                Some(other) => return Err(format!("{body_key} must be a string, got {other}")),
            }

            match object.get(children_key) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    for item in items {
                        let comment = item.as_object().ok_or_else(|| {
                            format!("{children_key} must only contain objects, got {item}")
                        })?;
                        stack.push((comment, COMMENT_BODY, COMMENT_CHILDREN));
                    }
                }
                Some(other) => {
                    return Err(format!("{children_key} must be an array, got {other}"));
                }
            }
        }

        Ok(Self { fields })
    }
}

impl Serialize for Post {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
