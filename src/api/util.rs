use log::debug;
use reqwest::StatusCode;

use super::MarketError;

pub fn status_code(e: &MarketError) -> StatusCode {
    match e {
        MarketError::Unauthenticated | MarketError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        MarketError::Forbidden => StatusCode::FORBIDDEN,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::AlreadyResolved | MarketError::EmailTaken => StatusCode::CONFLICT,
        MarketError::InvalidBet(_)
        | MarketError::InvalidResolution(_)
        | MarketError::InvalidInviteCode
        | MarketError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MarketError::InvariantViolated(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
pub fn map_err_and_code(e: MarketError) -> (StatusCode, String) {
    debug!("Error: {}", e);
    (status_code(&e), e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::BetRejection;

    #[test]
    fn errors_map_to_client_and_server_codes() {
        assert_eq!(
            map_err_and_code(MarketError::InvalidBet(BetRejection::InsufficientBalance)),
            (
                StatusCode::BAD_REQUEST,
                "Cannot place bet: insufficient balance".to_string()
            )
        );
        assert_eq!(
            status_code(&MarketError::Forbidden),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_code(&MarketError::AlreadyResolved),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_code(&MarketError::InvariantViolated("negative pool".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
