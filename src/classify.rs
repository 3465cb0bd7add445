//! Pure syntactic mapping from HTTP method + path to one of the bridge's fixed operations (§4.1).
//! Deliberately has no knowledge of request bodies or session state — semantic validation belongs
//! to the operation handler, which is why this module has no dependency on [`crate::error`].

use axum::http::Method;

/// One of the bridge's operations, or a syntactic classification failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    CreateConsumer,
    DeleteConsumer,
    Subscribe,
    Unsubscribe,
    Assign,
    Poll,
    Commit,
    Seek,
    SeekToBeginning,
    SeekToEnd,
    Produce,
    Empty,
    Invalid,
    Unprocessable,
}

/// Classifies a request by method and path. `path` is expected already stripped of its query
/// string; segments are split on `/` and empty segments (leading/trailing slash) are ignored.
pub fn classify(method: &Method, path: &str) -> Operation {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => Operation::Empty,
        ["consumers", _group] => match *method {
            Method::POST => Operation::CreateConsumer,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name] => match *method {
            Method::DELETE => Operation::DeleteConsumer,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "subscription"] => match *method {
            Method::POST => Operation::Subscribe,
            Method::DELETE => Operation::Unsubscribe,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "assignments"] => match *method {
            Method::POST => Operation::Assign,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "records"] => match *method {
            Method::GET => Operation::Poll,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "offsets"] => match *method {
            Method::POST => Operation::Commit,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "positions"] => match *method {
            Method::POST => Operation::Seek,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "positions", "beginning"] => match *method {
            Method::POST => Operation::SeekToBeginning,
            _ => Operation::Invalid,
        },
        ["consumers", _group, "instances", _name, "positions", "end"] => match *method {
            Method::POST => Operation::SeekToEnd,
            _ => Operation::Invalid,
        },
        ["topics", _topic] => match *method {
            Method::POST => Operation::Produce,
            _ => Operation::Invalid,
        },
        _ => Operation::Unprocessable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_consumer_lifecycle() {
        assert_eq!(
            classify(&Method::POST, "/consumers/my-group"),
            Operation::CreateConsumer
        );
        assert_eq!(
            classify(&Method::DELETE, "/consumers/my-group/instances/my-consumer"),
            Operation::DeleteConsumer
        );
    }

    #[test]
    fn classifies_subscription_and_unsubscribe_by_method() {
        let path = "/consumers/g/instances/n/subscription";
        assert_eq!(classify(&Method::POST, path), Operation::Subscribe);
        assert_eq!(classify(&Method::DELETE, path), Operation::Unsubscribe);
    }

    #[test]
    fn classifies_poll_commit_seek_and_produce() {
        assert_eq!(
            classify(&Method::GET, "/consumers/g/instances/n/records"),
            Operation::Poll
        );
        assert_eq!(
            classify(&Method::POST, "/consumers/g/instances/n/offsets"),
            Operation::Commit
        );
        assert_eq!(
            classify(&Method::POST, "/consumers/g/instances/n/positions"),
            Operation::Seek
        );
        assert_eq!(
            classify(&Method::POST, "/consumers/g/instances/n/positions/beginning"),
            Operation::SeekToBeginning
        );
        assert_eq!(
            classify(&Method::POST, "/consumers/g/instances/n/positions/end"),
            Operation::SeekToEnd
        );
        assert_eq!(classify(&Method::POST, "/topics/my-topic"), Operation::Produce);
    }

    #[test]
    fn empty_path_and_unknown_shapes() {
        assert_eq!(classify(&Method::GET, "/"), Operation::Empty);
        assert_eq!(classify(&Method::GET, "/healthz/extra/segments"), Operation::Unprocessable);
    }

    #[test]
    fn wrong_method_on_known_path_is_invalid() {
        assert_eq!(
            classify(&Method::GET, "/consumers/my-group"),
            Operation::Invalid
        );
    }
}
