//! Error surface of the handle API.

use thiserror::Error;

/// Promotion failure: the observed target has already been released.
///
/// Returned by the fallible promotion paths (`Shared::try_from` on a weak
/// handle, `SelfReferencing::shared_from_self`). The non-throwing form,
/// `Weak::upgrade`, signals the same condition by returning `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dangling weak handle: the target has already been released")]
pub struct Dangling;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_message() {
        let message = Dangling.to_string();
        assert!(message.contains("dangling weak handle"));
    }
}
