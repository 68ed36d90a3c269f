//! Status codes outside the IANA registry that vendors use in practice.

/// Twitter search API rate limiting.
pub const ENHANCE_YOUR_CALM: u16 = 420;
/// Shopify rate limiting, in place of 429.
pub const SHOPIFY_REQUEST_HEADER_FIELDS_TOO_LARGE: u16 = 430;
/// Apache/cPanel bandwidth limit.
pub const BANDWIDTH_LIMIT_EXCEEDED: u16 = 509;
/// Cloudflare: origin returned an unexpected response.
pub const WEB_SERVER_RETURNED_AN_UNKNOWN_ERROR: u16 = 520;
/// Cloudflare: origin refused the connection.
pub const WEB_SERVER_IS_DOWN: u16 = 521;
/// Cloudflare: TCP handshake with the origin timed out.
pub const CONNECTION_TIMED_OUT: u16 = 522;
/// Cloudflare: origin could not be reached.
pub const ORIGIN_IS_UNREACHABLE: u16 = 523;
/// Cloudflare: origin accepted the connection but did not answer in time.
pub const TIMEOUT_OCCURRED: u16 = 524;
/// Cloudflare: Railgun connection interrupted.
pub const RAILGUN_ERROR: u16 = 527;
/// Pantheon: site is overloaded.
pub const SITE_IS_OVERLOADED: u16 = 529;
/// Cloudflare: accompanies a 1xxx error page.
pub const CLOUDFLARE_ERROR: u16 = 530;
/// Microsoft proxies: network read timeout.
pub const NETWORK_READ_TIMEOUT: u16 = 598;
/// Microsoft proxies: network connect timeout.
pub const NETWORK_CONNECT_TIMEOUT: u16 = 599;

/// Statuses retried by [`ClientPolicy::default`](crate::ClientPolicy).
pub const DEFAULT_RETRY_STATUS: [u16; 23] = [
    408, // Request Timeout
    409, // Conflict
    ENHANCE_YOUR_CALM,
    423, // Locked
    425, // Too Early
    429, // Too Many Requests
    SHOPIFY_REQUEST_HEADER_FIELDS_TOO_LARGE,
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
    507, // Insufficient Storage
    BANDWIDTH_LIMIT_EXCEEDED,
    WEB_SERVER_RETURNED_AN_UNKNOWN_ERROR,
    WEB_SERVER_IS_DOWN,
    CONNECTION_TIMED_OUT,
    ORIGIN_IS_UNREACHABLE,
    TIMEOUT_OCCURRED,
    RAILGUN_ERROR,
    SITE_IS_OVERLOADED,
    CLOUDFLARE_ERROR,
    NETWORK_READ_TIMEOUT,
    NETWORK_CONNECT_TIMEOUT,
];
