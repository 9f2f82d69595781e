pub mod avatar;
pub use avatar::AvatarService;

pub mod mailer;
pub use mailer::{LogMailer, Mailer, MailerError, SmtpMailer};

pub mod token;
pub use token::{ResetClaims, ResetTokenSigner, TokenError};
