//! Email Rendering and Queueing
//! Mission: Turn account events into rendered messages, delivered off the request path

pub mod queue;

pub use queue::{EmailQueue, EmailSender, LogSender};

/// A queued email task. Rendering happens in the worker, off the request path.
#[derive(Debug, Clone)]
pub enum EmailJob {
    Verification {
        to: String,
        username: String,
        token: String,
    },
    Welcome {
        to: String,
        username: String,
        roles: String,
    },
    PasswordReset {
        to: String,
        username: String,
        token: String,
    },
}

impl EmailJob {
    pub fn to(&self) -> &str {
        match self {
            EmailJob::Verification { to, .. }
            | EmailJob::Welcome { to, .. }
            | EmailJob::PasswordReset { to, .. } => to,
        }
    }

    /// Render into a concrete message. Links are built from the configured
    /// public base URL.
    pub fn render(&self, from: &str, base_url: &str) -> EmailMessage {
        match self {
            EmailJob::Verification {
                to,
                username,
                token,
            } => EmailMessage {
                from: from.to_string(),
                to: to.to_string(),
                subject: "Verify Your Email".to_string(),
                body: format!(
                    "Hi {username},\n\n\
                     Thank you for registering!\n\n\
                     Please click the following link to verify your email address:\n\
                     {base_url}/verify-email?email={to}&token={token}\n\n\
                     This link expires in 24 hours.\n\n\
                     If you did not create this account, you can ignore this email.\n"
                ),
            },
            EmailJob::Welcome {
                to,
                username,
                roles,
            } => EmailMessage {
                from: from.to_string(),
                to: to.to_string(),
                subject: "Welcome!".to_string(),
                body: format!(
                    "Hi {username},\n\n\
                     Your email has been verified and your account is now active.\n\
                     Assigned roles: {roles}\n\n\
                     You can now log in.\n"
                ),
            },
            EmailJob::PasswordReset {
                to,
                username,
                token,
            } => EmailMessage {
                from: from.to_string(),
                to: to.to_string(),
                subject: "Reset Your Password".to_string(),
                body: format!(
                    "Hi {username},\n\n\
                     We received a request to reset your password.\n\n\
                     Click the following link to choose a new one:\n\
                     {base_url}/reset-password?email={to}&token={token}\n\n\
                     This link expires in 1 hour.\n\n\
                     If you did not request a reset, you can ignore this email.\n"
                ),
            },
        }
    }
}

/// A rendered message ready for a transport
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}
