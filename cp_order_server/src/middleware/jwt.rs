//! Bearer token middleware.
//!
//! Wrap the `/api` scope with this middleware. It reads the `Authorization: Bearer <jwt>` header, validates the token
//! and stores the [`JwtClaims`] in the request extensions, where handlers and the ACL middleware pick them up. Requests
//! without a valid token are answered with a 401 and never reach the handler.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
    ResponseError,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{JwtClaims, TokenValidator},
    errors::{AuthError, ServerError},
    helpers::bearer_token,
};

pub struct JwtMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { validator: self.validator.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    validator: TokenValidator,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let claims = extract_claims(&req, &self.validator);
        Box::pin(async move {
            match claims {
                Ok(claims) => {
                    trace!("💻️ Authenticated request from {}", claims.sub);
                    req.extensions_mut().insert::<JwtClaims>(claims);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                },
                Err(e) => {
                    debug!("💻️ Rejecting unauthenticated request to {}. {e}", req.path());
                    let response = ServerError::AuthenticationError(e).error_response();
                    Ok(req.into_response(response).map_into_right_body())
                },
            }
        })
    }
}

fn extract_claims(req: &ServiceRequest, validator: &TokenValidator) -> Result<JwtClaims, AuthError> {
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let token = bearer_token(value)
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Authorization: Bearer <token>'".to_string()))?;
    validator.validate(token)
}
