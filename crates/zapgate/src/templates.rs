//! Notification message templates.
//!
//! Templates use `{{name}}` placeholders. Rendering is strict: every
//! placeholder must have a value.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::credential::{Role, can_edit_message_key};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("no value for template variable '{0}'")]
    MissingVariable(String),

    #[error("role '{0}' may not edit message templates")]
    Forbidden(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
}

impl MessageTemplate {
    pub fn new(id: &str, name: &str, content: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    /// Replace `{{var}}` placeholders with values from `vars`.
    ///
    /// Whitespace inside the braces is ignored. An unclosed `{{` is kept as
    /// literal text.
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut result = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];

            let Some(end) = after_open.find("}}") else {
                result.push_str("{{");
                rest = after_open;
                continue;
            };
            let name = after_open[..end].trim();
            let value = vars
                .get(name)
                .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
            result.push_str(value);
            rest = &after_open[end + 2..];
        }

        result.push_str(rest);
        Ok(result)
    }

    /// Placeholder names in order of first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.content.as_str();
        while let Some(start) = rest.find("{{") {
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                break;
            };
            let name = after_open[..end].trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after_open[end + 2..];
        }
        names
    }
}

/// The editable set of templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSet {
    templates: Vec<MessageTemplate>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            templates: vec![
                MessageTemplate::new(
                    "new-client",
                    "Novo Cliente",
                    "Olá {{client_name}}, bem-vindo(a) à nossa empresa! \
                     Agradecemos por escolher nossos serviços.",
                ),
                MessageTemplate::new(
                    "invoice-created",
                    "Fatura Gerada",
                    "Olá {{client_name}}, sua fatura no valor de R$ {{amount}} foi gerada \
                     e vence em {{due_date}}. Acesse o link para pagamento: {{payment_link}}",
                ),
                MessageTemplate::new(
                    "invoice-overdue",
                    "Fatura em Atraso",
                    "Olá {{client_name}}, sua fatura no valor de R$ {{amount}} com vencimento \
                     em {{due_date}} está em atraso. Regularize seu pagamento: {{payment_link}}",
                ),
                MessageTemplate::new(
                    "invoice-paid",
                    "Fatura Paga",
                    "Olá {{client_name}}, recebemos seu pagamento de R$ {{amount}}. Obrigado!",
                ),
            ],
        }
    }
}

impl TemplateSet {
    pub fn iter(&self) -> impl Iterator<Item = &MessageTemplate> {
        self.templates.iter()
    }

    pub fn get(&self, id: &str) -> Option<&MessageTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn render(&self, id: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        self.get(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?
            .render(vars)
    }

    /// Replace a template's content. Same roles as the message key.
    pub fn update(&mut self, role: Role, id: &str, content: &str) -> Result<(), TemplateError> {
        if !can_edit_message_key(role) {
            return Err(TemplateError::Forbidden(role));
        }
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
        template.content = content.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_invoice_created() {
        let set = TemplateSet::default();
        let text = set
            .render(
                "invoice-created",
                &vars(&[
                    ("client_name", "Ana"),
                    ("amount", "150,00"),
                    ("due_date", "10/11/2026"),
                    ("payment_link", "https://pay.example/abc"),
                ]),
            )
            .unwrap();

        assert_eq!(
            text,
            "Olá Ana, sua fatura no valor de R$ 150,00 foi gerada e vence em 10/11/2026. \
             Acesse o link para pagamento: https://pay.example/abc"
        );
    }

    #[test]
    fn whitespace_inside_braces_is_ignored() {
        let template = MessageTemplate::new("t", "T", "Hi {{ client_name }}!");
        let text = template.render(&vars(&[("client_name", "Bo")])).unwrap();
        assert_eq!(text, "Hi Bo!");
    }

    #[test]
    fn missing_variable_is_error() {
        let set = TemplateSet::default();
        let err = set
            .render("invoice-paid", &vars(&[("client_name", "Ana")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("amount".to_string()));
    }

    #[test]
    fn unclosed_braces_are_literal() {
        let template = MessageTemplate::new("t", "T", "Total {{amount");
        assert_eq!(template.render(&HashMap::new()).unwrap(), "Total {{amount");
    }

    #[test]
    fn unknown_template_is_not_found() {
        let err = TemplateSet::default()
            .render("nope", &HashMap::new())
            .unwrap_err();
        assert_eq!(err, TemplateError::NotFound("nope".to_string()));
    }

    #[test]
    fn variables_lists_unique_names() {
        let set = TemplateSet::default();
        let names = set.get("invoice-overdue").unwrap().variables();
        assert_eq!(names, ["client_name", "amount", "due_date", "payment_link"]);
    }

    #[test]
    fn manager_can_update() {
        let mut set = TemplateSet::default();
        set.update(Role::Manager, "invoice-paid", "Pago, {{client_name}}.")
            .unwrap();
        let text = set
            .render("invoice-paid", &vars(&[("client_name", "Ana")]))
            .unwrap();
        assert_eq!(text, "Pago, Ana.");
    }

    #[test]
    fn user_cannot_update() {
        let mut set = TemplateSet::default();
        let err = set.update(Role::User, "invoice-paid", "x").unwrap_err();
        assert_eq!(err, TemplateError::Forbidden(Role::User));
        assert!(set.get("invoice-paid").unwrap().content.contains("Obrigado"));
    }

    #[test]
    fn default_set_has_four_templates() {
        let set = TemplateSet::default();
        let ids: Vec<&str> = set.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            ["new-client", "invoice-created", "invoice-overdue", "invoice-paid"]
        );
    }
}
