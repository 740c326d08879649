//! HTML pages served by the web UI

use crate::Result;
use minijinja::{context, Environment};

const WELCOME_TEMPLATE: &str = "welcome.html";
const CHAT_TEMPLATE: &str = "chat.html";
const DIGITAL_GOLD_TEMPLATE: &str = "digital_gold.html";

/// Templates compiled into the binary
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(WELCOME_TEMPLATE, include_str!("../templates/welcome.html"))?;
        env.add_template(CHAT_TEMPLATE, include_str!("../templates/chat.html"))?;
        env.add_template(
            DIGITAL_GOLD_TEMPLATE,
            include_str!("../templates/digital_gold.html"),
        )?;
        Ok(Self { env })
    }

    pub fn render_welcome(&self) -> Result<String> {
        Ok(self.env.get_template(WELCOME_TEMPLATE)?.render(context! {})?)
    }

    /// Chat page bound to the given user id
    pub fn render_chat(&self, user_id: &str) -> Result<String> {
        Ok(self
            .env
            .get_template(CHAT_TEMPLATE)?
            .render(context! { user_id => user_id })?)
    }

    pub fn render_digital_gold(&self) -> Result<String> {
        Ok(self.env.get_template(DIGITAL_GOLD_TEMPLATE)?.render(context! {})?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_render() {
        let pages = Pages::new().unwrap();
        assert!(pages.render_welcome().unwrap().contains("/send_name"));
        assert!(pages.render_digital_gold().unwrap().contains("Digital Gold"));
    }

    #[test]
    fn test_chat_page_escapes_user_id() {
        let pages = Pages::new().unwrap();
        let html = pages.render_chat("<b>asha</b>").unwrap();
        assert!(html.contains("&lt;b&gt;asha"));
        assert!(!html.contains("<b>asha</b>"));
    }
}
