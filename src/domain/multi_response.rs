use {
    super::{
        error::GatewayError,
        response::{AvsResult, CvvResult, Response, StandardErrorCode},
    },
    std::{collections::BTreeMap, future::Future},
};

/// Which step of a chain represents the composite result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseResponse {
    /// The first successful step stays primary (e.g. the authorization of an
    /// authorize-then-void verify).
    First,
    /// Every processed step replaces the primary.
    Last,
}

/// Runs dependent gateway calls in sequence, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct MultiResponse {
    policy: UseResponse,
    responses: Vec<Response>,
    primary: Option<usize>,
}

impl MultiResponse {
    pub fn new(policy: UseResponse) -> Self {
        Self {
            policy,
            responses: Vec::new(),
            primary: None,
        }
    }

    /// Runs `step` unless an earlier step failed, and makes its result
    /// primary according to the policy.
    pub async fn process<F, Fut>(&mut self, step: F) -> Result<(), GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, GatewayError>>,
    {
        self.run(step, false).await
    }

    /// Runs `step` unless an earlier step failed; its result is recorded but
    /// never becomes primary.
    pub async fn process_ignoring_result<F, Fut>(&mut self, step: F) -> Result<(), GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, GatewayError>>,
    {
        self.run(step, true).await
    }

    async fn run<F, Fut>(&mut self, step: F, ignore_result: bool) -> Result<(), GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, GatewayError>>,
    {
        if !self.success() {
            return Ok(());
        }

        let response = step().await?;
        let succeeded = response.success;
        let index = self.push(response);

        if !ignore_result {
            match (self.policy, self.primary) {
                (UseResponse::First, Some(_)) if succeeded => {}
                _ => self.primary = Some(index),
            }
        }
        Ok(())
    }

    /// Appends a response, flattening one that was itself composed from
    /// steps. Returns the index that stands for it.
    fn push(&mut self, mut response: Response) -> usize {
        if response.steps.is_empty() {
            self.responses.push(response);
            return self.responses.len() - 1;
        }

        let nested = std::mem::take(&mut response.steps);
        let primary = nested
            .iter()
            .rposition(|r| *r == response)
            .unwrap_or(nested.len() - 1);
        let base = self.responses.len();
        self.responses.extend(nested);
        base + primary
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn primary_response(&self) -> Option<&Response> {
        self.primary.map(|i| &self.responses[i])
    }

    pub fn success(&self) -> bool {
        self.primary_response().is_none_or(|r| r.success)
    }

    pub fn message(&self) -> Option<&str> {
        self.primary_response().map(|r| r.message.as_str())
    }

    pub fn params(&self) -> Option<&BTreeMap<String, String>> {
        self.primary_response().map(|r| &r.params)
    }

    pub fn authorization(&self) -> Option<&str> {
        self.primary_response()
            .and_then(|r| r.authorization.as_deref())
    }

    pub fn test(&self) -> bool {
        self.primary_response().is_some_and(|r| r.test)
    }

    pub fn fraud_review(&self) -> bool {
        self.primary_response().is_some_and(|r| r.fraud_review)
    }

    pub fn error_code(&self) -> Option<StandardErrorCode> {
        self.primary_response().and_then(|r| r.error_code)
    }

    pub fn avs_result(&self) -> Option<&AvsResult> {
        self.primary_response().map(|r| &r.avs_result)
    }

    pub fn cvv_result(&self) -> Option<&CvvResult> {
        self.primary_response().map(|r| &r.cvv_result)
    }

    pub fn emv_authorization(&self) -> Option<&str> {
        self.primary_response()
            .and_then(|r| r.emv_authorization.as_deref())
    }

    /// Collapses the chain into the primary response, keeping every step.
    /// An empty chain yields a bare successful response.
    pub fn into_response(self) -> Response {
        let mut response = match self.primary {
            Some(i) => self.responses[i].clone(),
            None => Response::new(true, ""),
        };
        response.steps = self.responses;
        response
    }
}
