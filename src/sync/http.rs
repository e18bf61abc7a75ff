//! HTTP cart service client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::debug;

use crate::{
    cart::ServerCart,
    config::CartConfig,
    coupons::Coupon,
    items::{ItemId, NewCartItem},
    prices::Quantity,
    sync::{
        CouponApplied, RemoteCartService, RemoteError,
        envelope::{
            ApplyCouponRequest, CalculateShippingRequest, CartEnvelope, UpdateQuantityRequest,
        },
    },
};

/// [`RemoteCartService`] over the cart REST API.
#[derive(Debug, Clone)]
pub struct HttpCartService {
    base_url: Url,
    http: Client,
}

impl HttpCartService {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`RemoteError::InvalidUrl`]: `base_url` is not an absolute URL that
    ///   paths can be appended to.
    /// - [`RemoteError::Http`]: the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(base_url).map_err(|error| RemoteError::InvalidUrl(error.to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, http })
    }

    /// Creates a client from configuration, if a base URL is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &CartConfig) -> Result<Option<Self>, RemoteError> {
        config
            .api_base_url
            .as_deref()
            .map(|base_url| Self::new(base_url, config.request_timeout()))
            .transpose()
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<ServerCart, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();

            return Err(classify(status, message));
        }

        let envelope: CartEnvelope = response.json().await?;

        ServerCart::try_from(envelope)
    }
}

#[async_trait]
impl RemoteCartService for HttpCartService {
    async fn add_item(&self, item: NewCartItem) -> Result<ServerCart, RemoteError> {
        debug!(product_id = %item.product_id, "POST /cart/items");

        self.send(self.http.post(self.url(&["cart", "items"])?).json(&item))
            .await
    }

    async fn update_item(&self, id: ItemId, quantity: Quantity) -> Result<ServerCart, RemoteError> {
        debug!(item_id = %id, quantity = quantity.get(), "PUT /cart/items/{{id}}");

        let body = UpdateQuantityRequest {
            quantity: quantity.get(),
        };

        let id = id.to_string();

        self.send(self.http.put(self.url(&["cart", "items", id.as_str()])?).json(&body))
            .await
    }

    async fn remove_item(&self, id: ItemId) -> Result<ServerCart, RemoteError> {
        debug!(item_id = %id, "DELETE /cart/items/{{id}}");

        let id = id.to_string();

        self.send(self.http.delete(self.url(&["cart", "items", id.as_str()])?))
            .await
    }

    async fn apply_coupon(&self, code: String) -> Result<CouponApplied, RemoteError> {
        debug!(%code, "POST /cart/coupons");

        let body = ApplyCouponRequest { code: &code };
        let cart = self
            .send(self.http.post(self.url(&["cart", "coupons"])?).json(&body))
            .await?;

        let coupon = find_applied(&cart, &code)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("coupon {code} was not applied")))?;

        Ok(CouponApplied {
            coupon,
            cart: Some(cart),
        })
    }

    async fn remove_coupon(&self, id: String) -> Result<ServerCart, RemoteError> {
        debug!(coupon_id = %id, "DELETE /cart/coupons/{{id}}");

        self.send(self.http.delete(self.url(&["cart", "coupons", id.as_str()])?))
            .await
    }

    async fn calculate_shipping(&self, method_id: String) -> Result<ServerCart, RemoteError> {
        debug!(shipping_method = %method_id, "POST /cart/calculate-shipping");

        let body = CalculateShippingRequest {
            shipping_method_id: &method_id,
        };

        self.send(
            self.http
                .post(self.url(&["cart", "calculate-shipping"])?)
                .json(&body),
        )
        .await
    }

    async fn get_cart(&self) -> Result<ServerCart, RemoteError> {
        debug!("GET /cart");

        self.send(self.http.get(self.url(&["cart"])?)).await
    }
}

/// Client errors that describe a refusal rather than a fault.
fn classify(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Rejected(message)
        }
        _ => RemoteError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn find_applied<'a>(cart: &'a ServerCart, code: &str) -> Option<&'a Coupon> {
    cart.applied_coupons
        .as_deref()?
        .iter()
        .find(|coupon| coupon.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::coupons::CouponKind;

    use super::*;

    #[test]
    fn urls_join_without_double_slashes() -> TestResult {
        let service = HttpCartService::new("http://localhost:8080/api/", Duration::from_secs(1))?;

        assert_eq!(
            service.url(&["cart", "items"])?.as_str(),
            "http://localhost:8080/api/cart/items"
        );

        let bare = HttpCartService::new("http://localhost:8080", Duration::from_secs(1))?;

        assert_eq!(bare.url(&["cart"])?.as_str(), "http://localhost:8080/cart");

        Ok(())
    }

    #[test]
    fn ids_are_encoded_as_single_segments() -> TestResult {
        let service = HttpCartService::new("http://localhost:8080/api", Duration::from_secs(1))?;
        let id = ItemId::server("line/1?x#y").to_string();

        assert_eq!(
            service.url(&["cart", "items", id.as_str()])?.as_str(),
            "http://localhost:8080/api/cart/items/line%2F1%3Fx%23y"
        );

        Ok(())
    }

    #[test]
    fn base_url_must_accept_paths() {
        assert!(matches!(
            HttpCartService::new("mailto:carts@example.com", Duration::from_secs(1)),
            Err(RemoteError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpCartService::new("not a url", Duration::from_secs(1)),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn from_config_requires_base_url() -> TestResult {
        let mut config = CartConfig::default();

        assert!(HttpCartService::from_config(&config)?.is_none());

        config.api_base_url = Some("http://localhost:8080".to_string());

        assert!(HttpCartService::from_config(&config)?.is_some());

        Ok(())
    }

    #[test]
    fn refusals_are_rejections() {
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, "expired".to_string()),
            RemoteError::Rejected(message) if message == "expired"
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, String::new()),
            RemoteError::Status { status: 502, .. }
        ));
    }

    #[test]
    fn applied_coupon_is_found_by_code() {
        let cart = ServerCart {
            applied_coupons: Some(vec![Coupon::new("c1", "SHIP", CouponKind::FreeShipping)]),
            ..ServerCart::default()
        };

        assert_eq!(find_applied(&cart, "ship").map(|coupon| coupon.id.as_str()), Some("c1"));
        assert!(find_applied(&cart, "TEN").is_none());
    }
}
