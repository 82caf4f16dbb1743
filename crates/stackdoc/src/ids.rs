//! Content-derived identifiers.
//!
//! Identifiers are derived from a BLAKE3 digest of a canonical input string and rendered as
//! lowercase hex. The same input yields the same identifier on every build and every platform.

/// Number of hex characters kept for logical id suffixes.
pub const HASH_SUFFIX_LENGTH: usize = 16;

pub fn digest_hex(input: &[u8]) -> String {
    hex::encode(blake3::hash(input).as_bytes())
}

/// Returns a 16 character suffix derived from `input`, with the first character uppercased so
/// that it reads as a separate word when appended to a logical id (`LaunchTemplateA6f65dee...`).
///
/// `HeadNode` is kept as it is, head node resources are unique within a cluster.
pub fn create_hash_suffix(input: &str) -> String {
    if input == "HeadNode" {
        return input.to_string();
    }
    let digest = digest_hex(input.as_bytes());
    capitalize(&digest[..HASH_SUFFIX_LENGTH])
}

/// Digest of a list of members that does not depend on the order of the members.
///
/// Members are sorted and joined by a newline before hashing.
pub fn canonical_digest<I, S>(members: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut members: Vec<String> = members
        .into_iter()
        .map(|member| member.as_ref().to_string())
        .collect();
    members.sort();
    digest_hex(members.join("\n").as_bytes())
}

/// Keeps only ASCII alphanumeric characters, the character set of logical ids.
pub fn sanitize_logical_id(input: &str) -> String {
    input.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_suffix_is_stable() {
        let a = create_hash_suffix("queue1compute1");
        assert_eq!(a, create_hash_suffix("queue1compute1"));
        assert_ne!(a, create_hash_suffix("queue1compute2"));
        assert_eq!(a.len(), HASH_SUFFIX_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!a.chars().next().unwrap().is_ascii_lowercase());
    }

    #[test]
    fn head_node_suffix() {
        assert_eq!(create_hash_suffix("HeadNode"), "HeadNode");
    }

    #[test]
    fn canonical_digest_ignores_order() {
        assert_eq!(
            canonical_digest(["b", "a", "c"]),
            canonical_digest(vec!["c".to_string(), "a".to_string(), "b".to_string()])
        );
        assert_ne!(canonical_digest(["a", "b"]), canonical_digest(["a", "b", "c"]));
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_logical_id("AWS::StackId"), "AWSStackId");
        assert_eq!(sanitize_logical_id("queue-1_a"), "queue1a");
    }
}
