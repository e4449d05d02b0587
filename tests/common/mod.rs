#![allow(dead_code)]

use merchant_gateways::domain::card::{Address, CreditCard, PaymentOptions};
use merchant_gateways::domain::error::GatewayError;
use merchant_gateways::infra::http_client::{Headers, RawResponse, Transport, TransportFuture};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A request the adapter handed to the transport.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub body: String,
    pub headers: Headers,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued replies in order and records every request it sees.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<RawResponse, String>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        let mock = Self::new();
        mock.push(status, body);
        mock
    }

    pub fn push(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(RawResponse::new(status, body)));
    }

    pub fn push_connection_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    fn reply(&self, recorded: Recorded) -> Result<RawResponse, GatewayError> {
        self.requests.lock().unwrap().push(recorded);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(message)) => Err(GatewayError::Connection(message)),
            None => panic!("mock transport has no queued reply"),
        }
    }
}

impl Transport for MockTransport {
    fn post<'a>(&'a self, url: &'a str, body: String, headers: Headers) -> TransportFuture<'a> {
        let result = self.reply(Recorded {
            method: "POST",
            url: url.to_string(),
            body,
            headers,
        });
        Box::pin(async move { result })
    }

    fn get<'a>(&'a self, url: &'a str, headers: Headers) -> TransportFuture<'a> {
        let result = self.reply(Recorded {
            method: "GET",
            url: url.to_string(),
            body: String::new(),
            headers,
        });
        Box::pin(async move { result })
    }
}

pub fn visa() -> CreditCard {
    CreditCard::new("4111111111111111", 9, 2030, "Longbob", "Longsen")
        .unwrap()
        .with_verification_value("123")
}

pub fn mastercard() -> CreditCard {
    CreditCard::new("5105105105105100", 12, 2031, "Jane", "Doe")
        .unwrap()
        .with_verification_value("456")
}

pub fn options() -> PaymentOptions {
    PaymentOptions {
        order_id: Some("order-1".into()),
        description: Some("Store purchase".into()),
        email: Some("buyer@example.com".into()),
        ip: Some("127.0.0.1".into()),
        billing_address: Some(Address {
            name: Some("Longbob Longsen".into()),
            address1: Some("456 My Street".into()),
            address2: Some("Apt 1".into()),
            city: Some("Ottawa".into()),
            state: Some("ON".into()),
            zip: Some("K1C2N6".into()),
            country: Some("CA".into()),
            phone: Some("(555)555-5555".into()),
        }),
        ..Default::default()
    }
}
