use crate::models::settings::EmailTemplate;

pub(crate) fn default_verify_email() -> EmailTemplate {
    EmailTemplate {
        subject: "Confirm your signup".into(),
        body: "<h2>Confirm your signup</h2><p> Enter the following code to verify your email: {{ .Code }}</p>".into(),
    }
}

pub(crate) fn default_reset_password() -> EmailTemplate {
    EmailTemplate {
        subject: "Reset your password".into(),
        body: "<h2>Reset your password</h2><p> Enter the following code to reset your password: {{ .Code }}</p>".into(),
    }
}

struct Values<'a> {
    code: &'a str,
    email: &'a str,
    identifier: &'a str,
}

impl Values<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            ".Code" => Some(self.code),
            ".Email" => Some(self.email),
            ".Identifier" => Some(self.identifier),
            _ => None,
        }
    }
}

/// Fill the placeholders of subject and body.
///
/// Placeholders are `{{ .Code }}`, `{{ .Email }}` and `{{ .Identifier }}`,
/// with any whitespace inside the braces. Values are HTML-escaped in the
/// body; the subject is plain text. Unknown placeholders are left as is.
pub(crate) fn render(
    template: &EmailTemplate,
    code: &str,
    email: &str,
    identifier: &str,
) -> EmailTemplate {
    let values = Values {
        code,
        email,
        identifier,
    };
    EmailTemplate {
        subject: fill(&template.subject, &values, |v| v.to_string()),
        body: fill(&template.body, &values, escape_html),
    }
}

fn fill(text: &str, values: &Values<'_>, encode: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        match values.lookup(after[..end].trim()) {
            Some(value) => out.push_str(&encode(value)),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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
