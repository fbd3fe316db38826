use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Framework build output, image optimizer and favicon
    static ref ASSET_PREFIX_REGEX: Regex = Regex::new(
        r"^/(?:_next/static|_next/image|favicon\.ico)"
    ).unwrap();

    // Common image extensions anywhere in the tree
    static ref IMAGE_EXTENSION_REGEX: Regex = Regex::new(
        r"\.(?:svg|png|jpg|jpeg|gif|webp)$"
    ).unwrap();
}

/// Request matcher: static assets skip the gate entirely.
pub fn is_static_asset(path: &str) -> bool {
    ASSET_PREFIX_REGEX.is_match(path) || IMAGE_EXTENSION_REGEX.is_match(path)
}
