//! RPC closure reachable as `go_rpc:call`

use messaging_actors::{Node, Term};
use tracing::{info, warn};

pub const RPC_MODULE: &str = "go_rpc";
pub const RPC_FUNCTION: &str = "call";

/// `{gonode, reply, N}` where `N` is the number of arguments
pub fn gonode_reply(args: &[Term]) -> Term {
    Term::tuple(vec![
        Term::atom("gonode"),
        Term::atom("reply"),
        Term::from(args.len()),
    ])
}

/// Register [`gonode_reply`], returning whether it is now callable
///
/// A refused registration is logged and otherwise ignored.
pub async fn provide(node: &Node) -> bool {
    match node.provide_rpc(RPC_MODULE, RPC_FUNCTION, gonode_reply).await {
        Ok(()) => {
            info!(module = RPC_MODULE, function = RPC_FUNCTION, "RPC provided");
            true
        }
        Err(e) => {
            warn!(error = %e, "Cannot provide function to RPC");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_counts_arguments() {
        assert_eq!(gonode_reply(&[]).to_string(), "{gonode,reply,0}");
        assert_eq!(
            gonode_reply(&[Term::atom("as"), Term::atom("qwe")]).to_string(),
            "{gonode,reply,2}"
        );
    }

    #[tokio::test]
    async fn test_second_provide_is_non_fatal() {
        let node = Node::new("gonode@localhost", "123");
        assert!(provide(&node).await);
        assert!(!provide(&node).await);
        node.shutdown().await;
    }
}
