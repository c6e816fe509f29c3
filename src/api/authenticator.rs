use std::time::Duration;

use crate::model::AccessToken;

use super::{
    client::InnerClient,
    models::{LoginRequest, LoginResponse},
};

/// Аутентификатор по логину и паролю.
///
/// Бэкенд обменивает пару логин/пароль на JWT токен через `/login`.
/// Срок жизни токена бэкенд не сообщает, поэтому о протухании мы узнаём
/// только по 401 от АПИ.
pub struct PasswordAuthenticator {
    client: InnerClient,
}

impl PasswordAuthenticator {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: InnerClient::new(base_url, timeout)?,
        })
    }

    /// Обменивает логин и пароль на токен доступа.
    pub fn login(&self, username: String, password: String) -> anyhow::Result<AccessToken> {
        const URL: &str = "/login";

        let payload = LoginRequest { username, password };

        let resp: LoginResponse = self.client.post(URL, Some(&payload), None)?;

        let access_token = AccessToken::new(resp.access_token, None)?;

        Ok(access_token)
    }
}
