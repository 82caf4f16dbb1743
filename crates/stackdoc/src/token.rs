use serde_json::Value;

use crate::{Error, intrinsic};

const TOKEN_PREFIX: &str = "${Token[";
const TOKEN_SUFFIX: &str = "]}";
/// A placeholder prefix in literal text is followed by an extra `[`, which no placeholder has.
const ESCAPED_PREFIX: &str = "${Token[[";

/// Lets intrinsic values travel through code that only handles text.
///
/// An intrinsic is replaced by a placeholder string (`${Token[N]}`) that can be embedded into
/// any rendered text, e.g. a JSON document serialized to a string. Resolving the text afterwards
/// splits it at the placeholders and yields an `Fn::Join` of literal parts and the original
/// intrinsic values.
///
/// Literal text that ends up next to placeholders and comes from outside (names, paths, user
/// settings) has to go through [`TokenMap::escape`] first, otherwise it could contain text that
/// reads as a placeholder.
#[derive(Clone, Debug, Default)]
pub struct TokenMap {
    values: Vec<Value>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns text that stands for `value`. Plain strings are returned unchanged.
    pub fn tokenize(&mut self, value: Value) -> String {
        match value {
            Value::String(text) => text,
            value => {
                let index = self.values.len();
                self.values.push(value);
                format!("{TOKEN_PREFIX}{index}{TOKEN_SUFFIX}")
            }
        }
    }

    /// Makes literal text safe to embed next to placeholders, [`TokenMap::resolve`] restores it.
    pub fn escape(text: &str) -> String {
        text.replace(TOKEN_PREFIX, ESCAPED_PREFIX)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolves text that may contain placeholders into a plain string, the single intrinsic it
    /// consists of, or an `Fn::Join` with an empty separator.
    pub fn resolve(&self, text: &str) -> crate::Result<Value> {
        let mut parts = vec![];
        let mut literal = String::new();
        let mut rest = text;

        while let Some(start) = rest.find(TOKEN_PREFIX) {
            let after = &rest[start + TOKEN_PREFIX.len()..];
            if let Some(escaped) = after.strip_prefix('[') {
                literal.push_str(&rest[..start + TOKEN_PREFIX.len()]);
                rest = escaped;
                continue;
            }
            let Some(end) = after.find(TOKEN_SUFFIX) else {
                break;
            };
            let Ok(index) = after[..end].parse::<usize>() else {
                literal.push_str(&rest[..start + TOKEN_PREFIX.len()]);
                rest = after;
                continue;
            };
            let value = self.values.get(index).ok_or(Error::UnknownToken(index))?;

            literal.push_str(&rest[..start]);
            if !literal.is_empty() {
                parts.push(Value::String(std::mem::take(&mut literal)));
            }
            parts.push(value.clone());
            rest = &after[end + TOKEN_SUFFIX.len()..];
        }
        literal.push_str(rest);

        if parts.is_empty() {
            return Ok(Value::String(literal));
        }
        if !literal.is_empty() {
            parts.push(Value::String(literal));
        }
        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        Ok(intrinsic::join("", parts))
    }

    /// Resolves every string nested in `value`.
    pub fn resolve_value(&self, value: Value) -> crate::Result<Value> {
        Ok(match value {
            Value::String(text) => self.resolve(&text)?,
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<crate::Result<_>>()?,
            ),
            Value::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.resolve_value(item)?)))
                    .collect::<crate::Result<_>>()?,
            ),
            value => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::reference;
    use serde_json::json;

    #[test]
    fn plain_text_is_kept() {
        let tokens = TokenMap::new();
        assert_eq!(tokens.resolve("hello").unwrap(), json!("hello"));
    }

    #[test]
    fn strings_are_not_tokenized() {
        let mut tokens = TokenMap::new();
        assert_eq!(tokens.tokenize(json!("vpc-123")), "vpc-123");
        assert!(tokens.is_empty());
    }

    #[test]
    fn text_with_tokens_becomes_join() {
        let mut tokens = TokenMap::new();
        let table = tokens.tokenize(reference("Table"));
        let zone = tokens.tokenize(reference("Zone"));
        let text = format!("{{\"table\": \"{table}\", \"zone\": \"{zone}\"}}");

        assert_eq!(
            tokens.resolve(&text).unwrap(),
            json!({"Fn::Join": ["", [
                "{\"table\": \"",
                {"Ref": "Table"},
                "\", \"zone\": \"",
                {"Ref": "Zone"},
                "\"}"
            ]]})
        );
    }

    #[test]
    fn single_token_resolves_to_value() {
        let mut tokens = TokenMap::new();
        let table = tokens.tokenize(reference("Table"));
        assert_eq!(tokens.resolve(&table).unwrap(), reference("Table"));
    }

    #[test]
    fn unknown_token_fails() {
        let tokens = TokenMap::new();
        assert!(matches!(
            tokens.resolve("a${Token[3]}b"),
            Err(Error::UnknownToken(3))
        ));
    }

    #[test]
    fn malformed_placeholder_is_literal() {
        let tokens = TokenMap::new();
        assert_eq!(
            tokens.resolve("${Token[x]} ${Token[").unwrap(),
            json!("${Token[x]} ${Token[")
        );
    }

    #[test]
    fn escaped_text_is_not_a_placeholder() {
        let mut tokens = TokenMap::new();
        let region = tokens.tokenize(reference("AWS::Region"));
        let literal = TokenMap::escape("/data${Token[0]}/${Token[[1]}");
        assert_eq!(literal, "/data${Token[[0]}/${Token[[[1]}");

        let text = format!("{literal}:{region}");
        assert_eq!(
            tokens.resolve(&text).unwrap(),
            json!({"Fn::Join": ["", [
                "/data${Token[0]}/${Token[[1]}:",
                {"Ref": "AWS::Region"}
            ]]})
        );
        assert_eq!(
            tokens.resolve(&TokenMap::escape("${Token[999]}")).unwrap(),
            json!("${Token[999]}")
        );
    }

    #[test]
    fn resolve_nested_values() {
        let mut tokens = TokenMap::new();
        let id = tokens.tokenize(reference("HeadNode"));
        let value = json!({"dims": [{"Value": id}], "n": 3});
        assert_eq!(
            tokens.resolve_value(value).unwrap(),
            json!({"dims": [{"Value": {"Ref": "HeadNode"}}], "n": 3})
        );
    }
}
