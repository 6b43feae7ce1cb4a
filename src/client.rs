use anyhow::Result;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::api::*;

/// A request the server answered with an unexpected status.
#[derive(Error, Debug)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub struct Client {
    url: String,
    client: reqwest::Client,
    token: Option<SessionToken>,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }
    pub fn with_token(mut self, token: Option<SessionToken>) -> Self {
        self.token = token;
        self
    }
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &impl Serialize,
        expected_code: StatusCode,
    ) -> Result<T> {
        let builder = self.client.post(self.url.clone() + path).json(request);
        let response = self.authorized(builder).send().await?;
        Ok(bail_if_err(response, expected_code).await?.json::<T>().await?)
    }
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let builder = self.client.get(self.url.clone() + path);
        let response = self.authorized(builder).send().await?;
        Ok(bail_if_err(response, StatusCode::OK).await?.json::<T>().await?)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse> {
        self.post("/api/auth/register", &request, StatusCode::OK)
            .await
    }
    /// Logs in and keeps the session token for the following requests.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .post("/api/auth/login", &request, StatusCode::OK)
            .await?;
        self.token = Some(response.session_token.clone());
        Ok(response)
    }
    pub async fn logout(&mut self) -> Result<()> {
        let builder = self.client.post(self.url.clone() + "/api/auth/logout");
        let response = self.authorized(builder).send().await?;
        bail_if_err(response, StatusCode::OK).await?;
        self.token = None;
        Ok(())
    }
    pub async fn me(&self) -> Result<UserResponse> {
        self.get("/api/auth/me").await
    }
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        self.get("/api/markets").await
    }
    pub async fn get_market(&self, market: MarketId) -> Result<Market> {
        self.get(&format!("/api/markets/{}", market)).await
    }
    pub async fn create_market(&self, request: CreateMarketRequest) -> Result<Market> {
        self.post("/api/markets", &request, StatusCode::CREATED)
            .await
    }
    pub async fn resolve_market(&self, market: MarketId, resolution: &str) -> Result<Settlement> {
        let request = ResolveMarketRequest {
            resolution: resolution.to_string(),
        };
        self.post(
            &format!("/api/markets/{}/resolve", market),
            &request,
            StatusCode::OK,
        )
        .await
    }
    pub async fn get_market_bets(&self, market: MarketId) -> Result<Vec<Bet>> {
        self.get(&format!("/api/markets/{}/bets", market)).await
    }
    pub async fn quote(
        &self,
        market: MarketId,
        position: &str,
        amount: Decimal,
    ) -> Result<QuoteResponse> {
        let response = self
            .client
            .get(format!("{}/api/markets/{}/quote", self.url, market))
            .query(&[("position", position.to_string()), ("amount", amount.to_string())])
            .send()
            .await?;
        Ok(bail_if_err(response, StatusCode::OK)
            .await?
            .json::<QuoteResponse>()
            .await?)
    }
    pub async fn place_bet(&self, request: PlaceBetRequest) -> Result<Bet> {
        self.post("/api/bets", &request, StatusCode::CREATED).await
    }
    pub async fn my_bets(&self) -> Result<Vec<Bet>> {
        self.get("/api/bets/my").await
    }
    pub async fn validate_invite_code(&self, code: &str) -> Result<bool> {
        let response: InviteValidationResponse = self
            .get(&format!("/api/invite/validate/{}", code))
            .await?;
        Ok(response.valid)
    }
}

async fn bail_if_err(response: Response, expected_code: StatusCode) -> Result<Response> {
    if response.status() != expected_code {
        let status = response.status();
        let message = response.text().await?;
        return Err(ApiError { status, message }.into());
    }
    Ok(response)
}

/// Status code of a failed request, if the server answered at all.
pub fn error_status(e: &anyhow::Error) -> Option<StatusCode> {
    e.downcast_ref::<ApiError>().map(|e| e.status)
}
