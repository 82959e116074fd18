use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::workflow::identity::IdentityResolver;

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[~accountid:([^\]]+)\]").expect("invalid mention regex"));

/// Rewrites `[~accountid:ID]` markers into `@Display Name`.
pub struct MentionRewriter {
    identities: Arc<IdentityResolver>,
}

impl MentionRewriter {
    pub fn new(identities: Arc<IdentityResolver>) -> Self {
        Self { identities }
    }

    pub async fn rewrite(&self, text: &str) -> String {
        // Collected up front; the regex iterator is not held across awaits.
        let markers: Vec<(usize, usize, &str)> = MENTION_PATTERN
            .captures_iter(text)
            .filter_map(|captures| {
                let marker = captures.get(0)?;
                let id = captures.get(1)?;
                Some((marker.start(), marker.end(), id.as_str()))
            })
            .collect();

        let mut rewritten = String::with_capacity(text.len());
        let mut last = 0;
        for (start, end, id) in markers {
            rewritten.push_str(&text[last..start]);
            rewritten.push('@');
            rewritten.push_str(&self.identities.resolve(id).await);
            last = end;
        }

        rewritten.push_str(&text[last..]);
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTracker;
    use crate::workflow::identity::IdentityCache;

    fn rewriter(tracker: FakeTracker) -> MentionRewriter {
        let identities = IdentityResolver::new(Arc::new(tracker), IdentityCache::new());
        MentionRewriter::new(Arc::new(identities))
    }

    #[tokio::test]
    async fn leaves_plain_text_untouched() {
        let rewriter = rewriter(FakeTracker::new());
        assert_eq!(rewriter.rewrite("").await, "");
        assert_eq!(rewriter.rewrite("nothing [here] ~").await, "nothing [here] ~");
    }

    #[tokio::test]
    async fn rewrites_single_marker() {
        let rewriter = rewriter(FakeTracker::new().with_user("u1", "Alice"));
        assert_eq!(
            rewriter.rewrite("[~accountid:u1] said hi").await,
            "@Alice said hi"
        );
    }

    #[tokio::test]
    async fn rewrites_every_marker_up_to_next_bracket() {
        let rewriter = rewriter(
            FakeTracker::new()
                .with_user("u1", "Alice")
                .with_user("5b10:abc", "Bob"),
        );
        let text = "cc [~accountid:u1] and [~accountid:5b10:abc]] plus [~accountid:ghost]";
        assert_eq!(
            rewriter.rewrite(text).await,
            "cc @Alice and @Bob] plus @Unknown User"
        );
    }
}
