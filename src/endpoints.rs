//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/transactions/{transaction_id}/approve',
//! use [format_endpoint].

/// The route for registering a new admin or child.
pub const REGISTER: &str = "/api/register";
/// The route for exchanging a name and password for an access token.
pub const LOG_IN: &str = "/api/login";
/// The route for getting the server's VAPID public key.
pub const VAPID_PUBLIC_KEY: &str = "/api/vapid-public-key";
/// The route for registering a push subscription.
pub const SUBSCRIBE: &str = "/api/subscribe";
/// The route for listing the registered children.
pub const CHILDREN: &str = "/api/children";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to approve a pending transaction.
pub const APPROVE_TRANSACTION: &str = "/api/transactions/{transaction_id}/approve";
/// The route to decline a pending transaction.
pub const DECLINE_TRANSACTION: &str = "/api/transactions/{transaction_id}/decline";
/// The route to get each child's balance.
pub const BALANCES: &str = "/api/balances";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::REGISTER);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::VAPID_PUBLIC_KEY);
        assert_endpoint_is_valid_uri(endpoints::SUBSCRIBE);
        assert_endpoint_is_valid_uri(endpoints::CHILDREN);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::APPROVE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::DECLINE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::BALANCES);
    }

    #[test]
    fn formats_decision_endpoints() {
        assert_eq!(
            format_endpoint(endpoints::APPROVE_TRANSACTION, 7),
            "/api/transactions/7/approve"
        );
        assert_eq!(
            format_endpoint(endpoints::DECLINE_TRANSACTION, 7),
            "/api/transactions/7/decline"
        );
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
