//! クーポン管理 API レスポンスの共通ハンドリング

use serde::de::DeserializeOwned;

use super::error::CouponApiError;

/// ボディ付きレスポンスを処理する
///
/// 成功時はボディを `T` にデシリアライズし、
/// エラー時はステータスコードに応じた `CouponApiError` を返す。
pub(super) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CouponApiError> {
    let status = response.status();

    if status.is_success() {
        let body = response.json::<T>().await?;
        return Ok(body);
    }

    Err(error_from_status(response).await)
}

/// ボディを使わないレスポンスを処理する（2xx なら成功）
pub(super) async fn handle_empty_response(
    response: reqwest::Response,
) -> Result<(), CouponApiError> {
    if response.status().is_success() {
        return Ok(());
    }

    Err(error_from_status(response).await)
}

async fn error_from_status(response: reqwest::Response) -> CouponApiError {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return CouponApiError::CredentialExpired;
    }

    let body = response.text().await.unwrap_or_default();
    CouponApiError::Server {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestData {
        value: String,
    }

    fn make_response(status: u16, body: &str) -> reqwest::Response {
        let http_resp = http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body.to_string())
            .unwrap();
        reqwest::Response::from(http_resp)
    }

    #[tokio::test]
    async fn test_成功レスポンスをデシリアライズする() {
        let response = make_response(200, r#"{"value": "hello"}"#);

        let result: Result<TestData, _> = handle_response(response).await;

        assert_eq!(
            result.unwrap(),
            TestData {
                value: "hello".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_401でcredential_expiredを返す() {
        let response = make_response(401, "token expired");

        let result: Result<TestData, _> = handle_response(response).await;

        assert_eq!(result, Err(CouponApiError::CredentialExpired));
    }

    #[tokio::test]
    async fn test_500でステータスとボディを含むserverエラーを返す() {
        let response = make_response(500, "server error");

        let result: Result<TestData, _> = handle_response(response).await;

        assert_eq!(
            result,
            Err(CouponApiError::Server {
                status: 500,
                body:   "server error".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_403は認証切れとして扱わない() {
        let response = make_response(403, "forbidden");

        let result = handle_empty_response(response).await;

        assert!(matches!(
            result,
            Err(CouponApiError::Server { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_空レスポンスの2xxは成功() {
        let response = make_response(202, "");

        assert_eq!(handle_empty_response(response).await, Ok(()));
    }

    #[tokio::test]
    async fn test_成功だが不正なjsonでnetworkエラーを返す() {
        let response = make_response(200, "not json");

        let result: Result<TestData, _> = handle_response(response).await;

        assert!(matches!(result, Err(CouponApiError::Network(_))));
    }
}
