//! The client facade: one session machine, its readiness gate and the
//! public operations built on top of it.

use crate::action;
use crate::config::ClientConfig;
use crate::flows::{self, FlowResult};
use crate::jwt::{self, HasuraClaim, JwtClaims};
use crate::listeners::{self, AuthStateListener, TokenChangedListener, Unsubscribe};
use crate::provider::{provider_url, Environment, Headless};
use crate::readiness;
use crate::refresh;
use crate::response::{
    ActionResponse, AuthenticationStatus, ProviderRedirect, RefreshResponse, SignInResponse,
    SignUpResponse,
};
use crate::signin::{route, DeanonymizeParams, SignInParams, SignInRoute};
use crate::{ClientError, ClientResult};
use auth_machine::{
    AuthBackend, AuthMachine, AuthOptions, DeanonymizeRequest, ErrorPayload,
    MemoryTokenStore, Session, TokenStore, User,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of passing the readiness gate.
enum Gate {
    Open(AuthMachine),
    /// Bootstrap did not settle; reported in the operation's result.
    Failed(ErrorPayload),
}

/// Authentication client for a hasura-auth backend.
///
/// Owns one session machine. Cloning the machine handle out through
/// [`machine`](Self::machine) shares it; the client itself is meant to be
/// constructed once and shared behind an `Arc`.
pub struct HasuraAuthClient {
    config: ClientConfig,
    machine: AuthMachine,
    environment: Arc<dyn Environment>,
}

impl HasuraAuthClient {
    /// Client with an in-memory token store and no navigation capability.
    pub fn new(config: ClientConfig, backend: Arc<dyn AuthBackend>) -> ClientResult<Self> {
        Self::with_parts(
            config,
            backend,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(Headless),
        )
    }

    /// Client with every collaborator supplied. Starts the machine right away
    /// when `config.start` is set, which requires a Tokio runtime.
    pub fn with_parts(
        config: ClientConfig,
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        environment: Arc<dyn Environment>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let machine = AuthMachine::new(backend, store, config.machine_options());
        let client = Self {
            config,
            machine,
            environment,
        };
        if client.config.start {
            client.start()?;
        }
        Ok(client)
    }

    /// Start the session machine. A no-op when it is already running.
    pub fn start(&self) -> ClientResult<()> {
        info!(backend_url = %self.config.backend_url, "Starting auth client");
        self.machine.start()?;
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying session machine.
    pub fn machine(&self) -> &AuthMachine {
        &self.machine
    }

    /// Wait for bootstrap to settle and return the machine.
    pub async fn wait_until_ready(&self) -> ClientResult<AuthMachine> {
        readiness::wait_until_ready(&self.machine, self.config.ready_timeout()).await
    }

    async fn open_gate(&self) -> ClientResult<Gate> {
        match self.wait_until_ready().await {
            Ok(machine) => Ok(Gate::Open(machine)),
            Err(err @ ClientError::ReadinessTimeout { .. }) => Ok(Gate::Failed(err.to_payload())),
            Err(err) => Err(err),
        }
    }

    /// Register with email and password.
    ///
    /// When an anonymous user is signed in, the account is upgraded instead.
    /// A pending email verification yields neither a session nor an error.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: &AuthOptions,
    ) -> ClientResult<SignUpResponse> {
        let machine = match self.open_gate().await? {
            Gate::Open(machine) => machine,
            Gate::Failed(error) => return Ok(SignUpResponse::failed(error)),
        };
        let result = flows::sign_up_email_password(&machine, email, password, options).await;
        Ok(SignUpResponse {
            session: result.session,
            error: result.error,
        })
    }

    /// Sign in with whichever credentials `params` carries.
    pub async fn sign_in(&self, params: &SignInParams) -> ClientResult<SignInResponse> {
        let machine = match self.open_gate().await? {
            Gate::Open(machine) => machine,
            Gate::Failed(error) => return Ok(SignInResponse::failed(error)),
        };

        let selected = route(params);
        debug!(route = route_name(&selected), "Dispatching sign-in");
        let response = match selected {
            SignInRoute::Provider { provider } => self.sign_in_provider(provider, params),
            SignInRoute::EmailPassword { email, password } => {
                let result = flows::sign_in_email_password(&machine, email, password).await;
                if result.needs_email_verification {
                    SignInResponse::failed(ErrorPayload::email_needs_verification())
                } else if let Some(mfa) = result.mfa {
                    SignInResponse {
                        mfa: Some(mfa),
                        ..SignInResponse::default()
                    }
                } else {
                    authentication_result(result)
                }
            }
            SignInRoute::PasswordlessEmail { email } => {
                let result = flows::sign_in_passwordless_email(&machine, email, &params.options).await;
                SignInResponse::with_session(None, result.error)
            }
            SignInRoute::SmsOtp { phone_number, otp } => {
                authentication_result(flows::sign_in_sms_otp(&machine, phone_number, otp).await)
            }
            SignInRoute::PasswordlessSms { phone_number } => {
                let result =
                    flows::sign_in_passwordless_sms(&machine, phone_number, &params.options).await;
                SignInResponse::with_session(None, result.error)
            }
            SignInRoute::MfaTotp { otp, ticket } => {
                authentication_result(flows::sign_in_mfa_totp(&machine, otp, ticket).await)
            }
            SignInRoute::Anonymous => authentication_result(flows::sign_in_anonymous(&machine).await),
        };
        Ok(response)
    }

    fn sign_in_provider(
        &self,
        provider: &str,
        params: &SignInParams,
    ) -> SignInResponse {
        let url = match provider_url(
            &self.config.backend_url,
            self.config.client_url.as_deref(),
            provider,
            &params.options,
        ) {
            Ok(url) => url,
            Err(err) => return SignInResponse::failed(err.to_payload()),
        };
        if self.environment.is_browser() {
            info!(provider, "Redirecting to provider");
            self.environment.navigate(&url);
        }
        SignInResponse {
            redirect: Some(ProviderRedirect {
                provider: provider.to_string(),
                provider_url: url,
            }),
            ..SignInResponse::default()
        }
    }

    /// Sign out, from every device when `all` is set.
    pub async fn sign_out(&self, all: bool) -> ClientResult<ActionResponse> {
        let machine = match self.open_gate().await? {
            Gate::Open(machine) => machine,
            Gate::Failed(error) => return Ok(ActionResponse::failed(error)),
        };
        let result = flows::sign_out(&machine, all).await;
        Ok(ActionResponse {
            error: result.error,
        })
    }

    /// Send a password-reset link.
    pub async fn reset_password(&self, email: &str, options: &AuthOptions) -> ActionResponse {
        action::reset_password(self.machine.backend(), email, options).await
    }

    /// Change the signed-in user's password.
    pub async fn change_password(&self, new_password: &str) -> ActionResponse {
        action::change_password(&self.machine, new_password).await
    }

    pub async fn send_verification_email(
        &self,
        email: &str,
        options: &AuthOptions,
    ) -> ActionResponse {
        action::send_verification_email(self.machine.backend(), email, options).await
    }

    /// Change the signed-in user's email. The new address must be confirmed
    /// by following the link sent to it.
    pub async fn change_email(&self, new_email: &str, options: &AuthOptions) -> ActionResponse {
        action::change_email(&self.machine, new_email, options).await
    }

    /// Upgrade the signed-in anonymous user to a regular account.
    ///
    /// Raises [`ClientError::UnknownDeanonymizationMethod`] when `params`
    /// names no supported method.
    pub async fn deanonymize(&self, params: &DeanonymizeParams) -> ClientResult<ActionResponse> {
        let request = params.resolve()?;
        let machine = match self.open_gate().await? {
            Gate::Open(machine) => machine,
            Gate::Failed(error) => return Ok(ActionResponse::failed(error)),
        };

        let snapshot = machine.snapshot();
        let is_anonymous = snapshot.matches("authentication.signedIn")
            && snapshot.user().is_some_and(|user| user.is_anonymous);
        if !is_anonymous {
            return Ok(ActionResponse::failed(ErrorPayload::unauthenticated()));
        }

        let result = match request {
            DeanonymizeRequest::EmailPassword {
                email,
                password,
                options,
            } => flows::sign_up_email_password(&machine, &email, &password, &options).await,
            DeanonymizeRequest::PasswordlessEmail { email, options } => {
                flows::sign_in_passwordless_email(&machine, &email, &options).await
            }
            DeanonymizeRequest::PasswordlessSms {
                phone_number,
                options,
            } => flows::sign_in_passwordless_sms(&machine, &phone_number, &options).await,
        };
        Ok(ActionResponse {
            error: result.error,
        })
    }

    /// Refresh the session with `refresh_token`, or with the current one.
    ///
    /// Never fails: every problem, including a readiness timeout, is reported
    /// in the response.
    pub async fn refresh_session(&self, refresh_token: Option<&str>) -> RefreshResponse {
        let machine = match self.wait_until_ready().await {
            Ok(machine) => machine,
            Err(err) => return RefreshResponse::failed(err.to_payload()),
        };
        refresh::refresh_session(&machine, refresh_token, self.config.refresh_timeout()).await
    }

    /// Session projected from the current snapshot.
    pub fn get_session(&self) -> Option<Session> {
        self.machine.snapshot().session()
    }

    pub fn get_user(&self) -> Option<User> {
        self.machine.snapshot().user().cloned()
    }

    pub fn get_access_token(&self) -> Option<String> {
        self.machine.snapshot().context.access_token.value.clone()
    }

    /// Claims of the current access token. Not verified.
    pub fn get_decoded_access_token(&self) -> Option<JwtClaims> {
        jwt::decode_claims(&self.get_access_token()?)
    }

    pub fn get_hasura_claims(&self) -> Option<JwtClaims> {
        let claims = self.get_decoded_access_token()?;
        jwt::hasura_claims(&claims).cloned()
    }

    /// Single Hasura claim; `name` may omit the `x-hasura-` prefix.
    pub fn get_hasura_claim(&self, name: &str) -> Option<HasuraClaim> {
        let claims = self.get_hasura_claims()?;
        HasuraClaim::from_value(claims.get(&jwt::hasura_claim_name(name))?)
    }

    /// Whether the user is signed in right now, without waiting for bootstrap.
    pub fn is_authenticated(&self) -> bool {
        self.machine.snapshot().matches("authentication.signedIn")
    }

    /// Whether the user is signed in once bootstrap has settled.
    pub async fn is_authenticated_async(&self) -> ClientResult<bool> {
        let machine = self.wait_until_ready().await?;
        Ok(machine.snapshot().matches("authentication.signedIn"))
    }

    pub fn get_authentication_status(&self) -> AuthenticationStatus {
        let snapshot = self.machine.snapshot();
        if snapshot.is_loading() {
            return AuthenticationStatus {
                is_authenticated: false,
                is_loading: true,
            };
        }
        AuthenticationStatus {
            is_authenticated: snapshot.matches("authentication.signedIn"),
            is_loading: false,
        }
    }

    /// Call `listener` with the new session after each token refresh.
    pub fn on_token_changed<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(Option<Session>) + Send + Sync + 'static,
    {
        let listener: TokenChangedListener = Arc::new(listener);
        listeners::on_token_changed(&self.machine, listener)
    }

    /// Call `listener` on each sign-in and sign-out.
    pub fn on_auth_state_changed<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(listeners::AuthChangeEvent, Option<Session>) + Send + Sync + 'static,
    {
        let listener: AuthStateListener = Arc::new(listener);
        listeners::on_auth_state_changed(&self.machine, listener)
    }
}

fn authentication_result(result: FlowResult) -> SignInResponse {
    SignInResponse::with_session(result.session, result.error)
}

fn route_name(route: &SignInRoute<'_>) -> &'static str {
    match route {
        SignInRoute::Provider { .. } => "provider",
        SignInRoute::EmailPassword { .. } => "email-password",
        SignInRoute::PasswordlessEmail { .. } => "passwordless-email",
        SignInRoute::SmsOtp { .. } => "sms-otp",
        SignInRoute::PasswordlessSms { .. } => "passwordless-sms",
        SignInRoute::MfaTotp { .. } => "mfa-totp",
        SignInRoute::Anonymous => "anonymous",
    }
}
