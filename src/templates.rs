//! Reply templates: one per known intent, with an inquiry fallback.
//!
//! Rendering is pure: the same label and fields always yield the same body.

use serde::{Deserialize, Serialize};

/// Values substituted into a template. Missing optional values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFields {
    pub sender_name: String,
    pub sender_company: String,
    pub sender_email: String,
    pub recipient_name: String,
    pub recipient_company: String,
    /// The user's original draft text.
    pub message: String,
}

/// Known reply templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Inquiry,
    Complaint,
    Sales,
    Negotiation,
    Partnership,
}

impl Template {
    pub const ALL: [Template; 5] = [
        Self::Inquiry,
        Self::Complaint,
        Self::Sales,
        Self::Negotiation,
        Self::Partnership,
    ];

    /// Template for an exact label, if one exists.
    pub fn for_label(label: &str) -> Option<Template> {
        match label {
            "inquiry" => Some(Self::Inquiry),
            "complaint" => Some(Self::Complaint),
            "sales" => Some(Self::Sales),
            "negotiation" => Some(Self::Negotiation),
            "partnership" => Some(Self::Partnership),
            _ => None,
        }
    }

    /// Template for any label; unknown labels use the inquiry template.
    pub fn resolve(label: &str) -> Template {
        Self::for_label(label).unwrap_or_else(|| {
            tracing::debug!("No template for label {label:?}, using inquiry");
            Self::Inquiry
        })
    }

    fn opening(&self, fields: &TemplateFields) -> String {
        match self {
            Self::Inquiry => "I hope this email finds you well.".to_string(),
            Self::Complaint => {
                "I am writing to bring an important matter to your attention.".to_string()
            }
            Self::Sales => "I hope you're doing well.".to_string(),
            Self::Negotiation => "Thank you for your proposal.".to_string(),
            Self::Partnership => format!(
                "I've been following {}'s impressive work in the industry.",
                fields.recipient_company
            ),
        }
    }

    fn ask(&self) -> &'static str {
        match self {
            Self::Inquiry => {
                "Could you please share your catalog and pricing information. I would appreciate a reply at your earliest convenience."
            }
            Self::Complaint => {
                "Please look into this matter urgently and let me know how you plan to resolve this issue."
            }
            Self::Sales => {
                "Would you be available for a quick 15-minute call next week to discuss how we might work together? Please let me know what time works best for you."
            }
            Self::Negotiation => {
                "We're very interested in moving forward, but would appreciate if you could reconsider the pricing. Could we schedule a brief call to discuss this further?"
            }
            Self::Partnership => {
                "I see great potential for collaboration between our companies. Would you be open to an exploratory conversation to discuss possible synergies?"
            }
        }
    }

    fn closing(&self) -> &'static str {
        match self {
            Self::Inquiry => "Thank you for your time and consideration.",
            Self::Complaint => "I look forward to your prompt response.",
            Self::Sales => "Looking forward to connecting!",
            Self::Negotiation => "Thank you for your understanding.",
            Self::Partnership => "I look forward to hearing from you.",
        }
    }

    fn sign_off(&self) -> &'static str {
        match self {
            Self::Complaint | Self::Negotiation => "Regards,",
            Self::Inquiry | Self::Sales | Self::Partnership => "Best regards,",
        }
    }

    /// Render this template.
    pub fn render(&self, fields: &TemplateFields) -> String {
        format!(
            "Dear {recipient},\n\n{opening}\n\n{message}\n\n{ask}\n\n{closing}\n\n{sign_off}\n{name}\n{company}\n{email}",
            recipient = fields.recipient_name,
            opening = self.opening(fields),
            message = fields.message,
            ask = self.ask(),
            closing = self.closing(),
            sign_off = self.sign_off(),
            name = fields.sender_name,
            company = fields.sender_company,
            email = fields.sender_email,
        )
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inquiry => write!(f, "inquiry"),
            Self::Complaint => write!(f, "complaint"),
            Self::Sales => write!(f, "sales"),
            Self::Negotiation => write!(f, "negotiation"),
            Self::Partnership => write!(f, "partnership"),
        }
    }
}

/// Render the reply body for a classified label.
pub fn render(label: &str, fields: &TemplateFields) -> String {
    Template::resolve(label).render(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TemplateFields {
        TemplateFields {
            sender_name: "Priya Shah".into(),
            sender_company: "ABC Corp".into(),
            sender_email: "priya@abc.example".into(),
            recipient_name: "John Smith".into(),
            recipient_company: "TechCorp".into(),
            message: "Could you send me your product catalog and pricing?".into(),
        }
    }

    #[test]
    fn inquiry_contains_fixed_ask() {
        let body = render("inquiry", &fields());
        assert!(body.starts_with("Dear John Smith,"));
        assert!(body.contains("share your catalog and pricing information."));
        assert!(body.contains("Could you send me your product catalog and pricing?"));
        assert!(body.ends_with("Priya Shah\nABC Corp\npriya@abc.example"));
    }

    #[test]
    fn unknown_label_falls_back_to_inquiry() {
        let f = fields();
        assert_eq!(render("follow_up", &f), render("inquiry", &f));
        assert_eq!(render("", &f), render("inquiry", &f));
        assert_eq!(render("INQUIRY", &f), render("inquiry", &f));
    }

    #[test]
    fn every_template_is_distinct_and_non_empty() {
        let f = fields();
        let bodies: Vec<String> = Template::ALL.iter().map(|t| t.render(&f)).collect();
        for (i, body) in bodies.iter().enumerate() {
            assert!(!body.trim().is_empty());
            assert!(body.contains(&f.message));
            for other in &bodies[i + 1..] {
                assert_ne!(body, other);
            }
        }
    }

    #[test]
    fn partnership_mentions_recipient_company() {
        let body = render("partnership", &fields());
        assert!(body.contains("I've been following TechCorp's impressive work"));
    }

    #[test]
    fn missing_optional_company_renders_empty() {
        let f = TemplateFields {
            recipient_company: String::new(),
            sender_company: String::new(),
            ..fields()
        };
        let body = render("partnership", &f);
        assert!(body.contains("I've been following 's impressive work"));
        assert!(body.ends_with("Priya Shah\n\npriya@abc.example"));
    }

    #[test]
    fn label_round_trips_through_display() {
        for template in Template::ALL {
            assert_eq!(Template::for_label(&template.to_string()), Some(template));
        }
    }
}
