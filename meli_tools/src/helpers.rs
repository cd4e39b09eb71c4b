use regex::Regex;

/// Extracts the numeric order id from a marketplace resource path like `/orders/2000003508419013`. Returns `None`
/// when the path does not reference an order.
pub fn extract_order_id(resource: &str) -> Option<String> {
    let re = Regex::new(r"/orders/(\d+)").unwrap();
    re.captures(resource).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}
