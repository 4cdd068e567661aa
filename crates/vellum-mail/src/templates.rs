//! Message templates. Each renders a plain-text and an HTML body from
//! the same fields; user-provided values are escaped in the HTML part.

use crate::mailer::Email;

/// Recipient of a templated message.
#[derive(Debug, Clone)]
pub struct Recipient<'a> {
    pub email: &'a str,
    pub name: &'a str,
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render(
    to: &Recipient<'_>,
    subject: String,
    paragraphs: &[String],
    link: Option<(&str, &str)>,
) -> Email {
    let mut text = format!("Hi {},\n\n", to.name);
    let mut html = format!("<p>Hi {},</p>\n", escape(to.name));

    for p in paragraphs {
        text.push_str(p);
        text.push_str("\n\n");
        html.push_str(&format!("<p>{}</p>\n", escape(p)));
    }
    if let Some((label, url)) = link {
        text.push_str(&format!("{label}: {url}\n\n"));
        html.push_str(&format!(
            "<p><a href=\"{}\">{}</a></p>\n",
            escape(url),
            escape(label)
        ));
    }
    text.push_str("The Vellum team\n");
    html.push_str("<p>The Vellum team</p>\n");

    Email {
        to: to.email.to_string(),
        to_name: Some(to.name.to_string()).filter(|n| !n.trim().is_empty()),
        subject,
        text,
        html,
    }
}

pub fn email_verification(to: &Recipient<'_>, verify_url: &str) -> Email {
    render(
        to,
        "Verify your email address".into(),
        &[
            "Thanks for signing up. Please confirm your email address to finish \
             setting up your account."
                .into(),
        ],
        Some(("Verify email", verify_url)),
    )
}

pub fn password_reset(to: &Recipient<'_>, reset_url: &str, valid_minutes: u64) -> Email {
    render(
        to,
        "Reset your password".into(),
        &[
            "We received a request to reset your password.".into(),
            format!(
                "The link below is valid for {valid_minutes} minutes. If you did not \
                 ask for this, you can ignore this message."
            ),
        ],
        Some(("Reset password", reset_url)),
    )
}

pub fn document_shared(
    to: &Recipient<'_>,
    shared_by: &str,
    document_title: &str,
    permission: &str,
    document_url: &str,
) -> Email {
    render(
        to,
        format!("{shared_by} shared \"{document_title}\" with you"),
        &[format!(
            "{shared_by} gave you {permission} access to \"{document_title}\"."
        )],
        Some(("Open document", document_url)),
    )
}

pub fn support_response(
    to: &Recipient<'_>,
    ticket_subject: &str,
    response: &str,
    status: &str,
) -> Email {
    render(
        to,
        format!("Re: {ticket_subject}"),
        &[
            format!("Our support team replied to your request \"{ticket_subject}\":"),
            response.to_string(),
            format!("Current status: {status}."),
        ],
        None,
    )
}
