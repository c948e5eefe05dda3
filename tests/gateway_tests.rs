use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use swap_desk::config::GatewayConfig;
use swap_desk::models::gateway::TradeSide;
use swap_desk::services::gateway::{
    ExchangeGateway, GatewayError, ObiexClient, TradeOrder, WithdrawalOrder,
};

fn client(server: &MockServer) -> ObiexClient {
    ObiexClient::new(&GatewayConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: Some("key-1".to_string()),
        api_secret: Some("secret-1".to_string()),
        sandbox: true,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn sell_btc() -> TradeOrder {
    TradeOrder {
        source: "BTC".to_string(),
        target: "USDT".to_string(),
        side: TradeSide::Sell,
        amount: dec!(0.5),
    }
}

#[tokio::test]
async fn test_quote_is_signed_and_unwrapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/trades/quote"))
        .and(header("x-api-key", "key-1"))
        .and(header_exists("x-api-timestamp"))
        .and(header_exists("x-api-signature"))
        .and(body_partial_json(json!({ "source": "BTC", "target": "USDT", "side": "SELL" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Ok",
            "data": {
                "id": "q-123",
                "rate": "60000",
                "amountReceived": "30000",
                "expiryDate": "2026-10-19T12:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = client(&server).create_quote(&sell_btc()).await.unwrap();
    assert_eq!(quote.id, "q-123");
    assert_eq!(quote.amount_received, dec!(30000));
}

#[tokio::test]
async fn test_trade_without_quote_creates_one_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/trades/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "q-9",
                "rate": "60000",
                "amountReceived": "30000",
                "expiryDate": "2026-10-19T12:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/trades/quote/q-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "trade-77", "amountReceived": "29990.5" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let trade = client(&server).trade(&sell_btc(), None).await.unwrap();
    assert_eq!(trade.id, "trade-77");
    assert_eq!(trade.transaction_id, "trade-77");
    assert_eq!(trade.status, "COMPLETED");
    assert_eq!(trade.amount_received, dec!(29990.5));
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/addresses/broker"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "message": "Invalid signature" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .get_deposit_address("BTC", "BTC", "deposit_1")
        .await
        .unwrap_err();
    match err {
        GatewayError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Invalid signature");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deposit_address_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/addresses/broker"))
        .and(body_partial_json(json!({ "currency": "XRP", "network": "XRP", "purpose": "deposit_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "address": "rExchangeAddr", "memo": "12345" }
        })))
        .mount(&server)
        .await;

    let address = client(&server)
        .get_deposit_address("XRP", "XRP", "deposit_1")
        .await
        .unwrap();
    assert_eq!(address.address, "rExchangeAddr");
    assert_eq!(address.memo.as_deref(), Some("12345"));
}

#[tokio::test]
async fn test_withdrawal_falls_back_to_id_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/wallets/ext/debit/crypto"))
        .and(body_partial_json(json!({ "destination": { "address": "TXyz", "network": "TRX" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "wd-1", "fee": "1.5" }
        })))
        .mount(&server)
        .await;

    let withdrawal = client(&server)
        .withdraw_crypto(&WithdrawalOrder {
            currency: "USDT".to_string(),
            network: "TRX".to_string(),
            amount: dec!(25),
            address: "TXyz".to_string(),
            memo: None,
        })
        .await
        .unwrap();

    assert_eq!(withdrawal.transaction_id, "wd-1");
    assert_eq!(withdrawal.status, "PENDING");
    assert_eq!(withdrawal.fee, dec!(1.5));
}

#[tokio::test]
async fn test_malformed_envelope_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/trades/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client(&server).create_quote(&sell_btc()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}
