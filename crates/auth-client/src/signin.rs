//! Sign-in parameter shapes and how they are routed.
//!
//! Shapes are told apart by which fields are present. The checks run in a
//! fixed order and the first match wins:
//!
//! | order | fields present            | route                 |
//! |-------|---------------------------|-----------------------|
//! | 1     | `provider`                | external provider     |
//! | 2     | `email` + `password`      | email and password    |
//! | 3     | `email`                   | passwordless email    |
//! | 4     | `phone_number` + `otp`    | SMS one-time code     |
//! | 5     | `phone_number`            | passwordless SMS      |
//! | 6     | `otp`                     | MFA TOTP              |
//! | 7     | nothing recognised        | anonymous             |

use crate::{ClientError, ClientResult};
use auth_machine::{AuthOptions, DeanonymizeRequest};

/// Credentials passed to `sign_in`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignInParams {
    pub provider: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub otp: Option<String>,
    /// MFA ticket. Falls back to the pending challenge when absent.
    pub ticket: Option<String>,
    pub options: AuthOptions,
}

impl SignInParams {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn passwordless_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn passwordless_sms(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }

    pub fn sms_otp(phone_number: impl Into<String>, otp: impl Into<String>) -> Self {
        Self {
            phone_number: Some(phone_number.into()),
            otp: Some(otp.into()),
            ..Self::default()
        }
    }

    pub fn mfa_totp(otp: impl Into<String>, ticket: Option<String>) -> Self {
        Self {
            otp: Some(otp.into()),
            ticket,
            ..Self::default()
        }
    }

    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: AuthOptions) -> Self {
        self.options = options;
        self
    }
}

/// Flow selected for a set of [`SignInParams`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignInRoute<'a> {
    Provider {
        provider: &'a str,
    },
    EmailPassword {
        email: &'a str,
        password: &'a str,
    },
    PasswordlessEmail {
        email: &'a str,
    },
    SmsOtp {
        phone_number: &'a str,
        otp: &'a str,
    },
    PasswordlessSms {
        phone_number: &'a str,
    },
    MfaTotp {
        otp: &'a str,
        ticket: Option<&'a str>,
    },
    Anonymous,
}

/// Pick the flow for `params`.
pub fn route(params: &SignInParams) -> SignInRoute<'_> {
    let email = params.email.as_deref();
    let password = params.password.as_deref();
    let phone_number = params.phone_number.as_deref();
    let otp = params.otp.as_deref();

    if let Some(provider) = params.provider.as_deref() {
        return SignInRoute::Provider { provider };
    }
    match (email, password) {
        (Some(email), Some(password)) => return SignInRoute::EmailPassword { email, password },
        (Some(email), None) => return SignInRoute::PasswordlessEmail { email },
        _ => {}
    }
    match (phone_number, otp) {
        (Some(phone_number), Some(otp)) => return SignInRoute::SmsOtp { phone_number, otp },
        (Some(phone_number), None) => return SignInRoute::PasswordlessSms { phone_number },
        _ => {}
    }
    if let Some(otp) = otp {
        return SignInRoute::MfaTotp {
            otp,
            ticket: params.ticket.as_deref(),
        };
    }
    SignInRoute::Anonymous
}

/// Credentials used to upgrade the signed-in anonymous user.
///
/// `sign_in_method` is `"email-password"` or `"passwordless"`; passwordless
/// upgrades also name a `connection`, `"email"` or `"sms"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeanonymizeParams {
    pub sign_in_method: String,
    pub connection: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub options: AuthOptions,
}

impl DeanonymizeParams {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            sign_in_method: "email-password".to_string(),
            email: Some(email.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn passwordless_email(email: impl Into<String>) -> Self {
        Self {
            sign_in_method: "passwordless".to_string(),
            connection: Some("email".to_string()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn passwordless_sms(phone_number: impl Into<String>) -> Self {
        Self {
            sign_in_method: "passwordless".to_string(),
            connection: Some("sms".to_string()),
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: AuthOptions) -> Self {
        self.options = options;
        self
    }

    fn method(&self) -> String {
        match &self.connection {
            Some(connection) => format!("{}/{}", self.sign_in_method, connection),
            None => self.sign_in_method.clone(),
        }
    }

    /// Resolve into the upgrade request. Missing credential fields are sent
    /// empty and rejected by flow validation.
    pub fn resolve(&self) -> ClientResult<DeanonymizeRequest> {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let options = self.options.clone();

        match (self.sign_in_method.as_str(), self.connection.as_deref()) {
            ("email-password", _) => Ok(DeanonymizeRequest::EmailPassword {
                email: field(&self.email),
                password: field(&self.password),
                options,
            }),
            ("passwordless", Some("email")) => Ok(DeanonymizeRequest::PasswordlessEmail {
                email: field(&self.email),
                options,
            }),
            ("passwordless", Some("sms")) => Ok(DeanonymizeRequest::PasswordlessSms {
                phone_number: field(&self.phone_number),
                options,
            }),
            _ => Err(ClientError::UnknownDeanonymizationMethod {
                method: self.method(),
            }),
        }
    }
}
