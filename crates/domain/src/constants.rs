//! Fixed names shared between the session client and its collaborators.

/// Persisted storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Persisted storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Persisted storage key for the user info JSON document.
pub const USER_INFO_KEY: &str = "user_info";

/// Logical endpoint names understood by [`crate::EndpointTable`].
pub mod endpoints {
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const VERIFY_OTP: &str = "verifyOtp";
    pub const RESEND_OTP: &str = "resendOtp";
    pub const FORGOT_PASSWORD: &str = "forgotPassword";
    pub const RESET_PASSWORD: &str = "resetPassword";
    pub const GOOGLE_LOGIN: &str = "googleLogin";
    pub const LOGOUT: &str = "logout";
    pub const PROFILE: &str = "profile";
    pub const PRODUCTS: &str = "products";
    pub const PRODUCT_DETAIL: &str = "productDetail";
    pub const CART: &str = "cart";
    pub const WISHLIST: &str = "wishlist";
    pub const ADDRESSES: &str = "addresses";
    pub const ADDRESS_DETAIL: &str = "addressDetail";
    pub const ORDERS: &str = "orders";
    pub const BLOGS: &str = "blogs";
    pub const BLOG_DETAIL: &str = "blogDetail";
}

/// Built-in path templates, keyed by logical endpoint name.
pub const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    (endpoints::LOGIN, "/auth/login"),
    (endpoints::REGISTER, "/auth/register"),
    (endpoints::REFRESH_TOKEN, "/auth/refresh-token"),
    (endpoints::VERIFY_OTP, "/auth/verify-otp"),
    (endpoints::RESEND_OTP, "/auth/resend-otp"),
    (endpoints::FORGOT_PASSWORD, "/auth/forgot-password"),
    (endpoints::RESET_PASSWORD, "/auth/reset-password"),
    (endpoints::GOOGLE_LOGIN, "/auth/google"),
    (endpoints::LOGOUT, "/auth/logout"),
    (endpoints::PROFILE, "/users/me"),
    (endpoints::PRODUCTS, "/products"),
    (endpoints::PRODUCT_DETAIL, "/products/:id"),
    (endpoints::CART, "/cart"),
    (endpoints::WISHLIST, "/wishlist"),
    (endpoints::ADDRESSES, "/addresses"),
    (endpoints::ADDRESS_DETAIL, "/addresses/:id"),
    (endpoints::ORDERS, "/orders"),
    (endpoints::BLOGS, "/blogs"),
    (endpoints::BLOG_DETAIL, "/blogs/:slug"),
];

/// Endpoints where a 401 means "credentials invalid", never "session expired".
pub const DEFAULT_AUTH_EXEMPT: &[&str] = &[
    endpoints::LOGIN,
    endpoints::REGISTER,
    endpoints::REFRESH_TOKEN,
    endpoints::VERIFY_OTP,
    endpoints::RESEND_OTP,
    endpoints::FORGOT_PASSWORD,
    endpoints::RESET_PASSWORD,
    endpoints::GOOGLE_LOGIN,
];

/// Default timeout for ordinary API requests (milliseconds).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default timeout for the token refresh call (milliseconds).
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15_000;
/// Default keychain service name.
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Storefront.session";
