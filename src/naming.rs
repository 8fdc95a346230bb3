//! Naming - `$placeholder$` substitution for output names and URLs.

/// Every `$name$` token in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = vec![];
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find('$') {
        let after = &rest[start + 1..];
        match after.find('$') {
            // `$$` has an empty name and is not a placeholder; the second
            // `$` may still open one.
            Some(0) => {
                offset += start + 1;
                rest = after;
            }
            Some(end) => {
                let token_end = start + end + 2;
                found.push(&template[offset + start..offset + token_end]);
                offset += token_end;
                rest = &rest[token_end..];
            }
            None => break,
        }
    }
    found
}

/// Literal replacement of each placeholder, in the order given.
/// Placeholders without a substitution pass through unchanged.
pub fn render<P, V>(template: &str, substitutions: &[(P, V)]) -> String
where
    P: AsRef<str>,
    V: AsRef<str>,
{
    let mut rendered = template.to_string();
    for (placeholder, value) in substitutions {
        let placeholder = placeholder.as_ref();
        if !placeholder.is_empty() && rendered.contains(placeholder) {
            rendered = rendered.replace(placeholder, value.as_ref());
        }
    }
    rendered
}

/// An output-name template from a build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    raw: String,
}

impl NameTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn placeholders(&self) -> Vec<&str> {
        placeholders(&self.raw)
    }

    pub fn render<P: AsRef<str>, V: AsRef<str>>(&self, substitutions: &[(P, V)]) -> String {
        render(&self.raw, substitutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_in_order() {
        let out = render("$a$-$b$", &[("$a$", "1"), ("$b$", "2")]);
        assert_eq!(out, "1-2");
    }

    #[test]
    fn test_unresolved_passes_through() {
        assert_eq!(render("$a$-$c$", &[("$a$", "1")]), "1-$c$");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let subs = [("$a$", "1"), ("$composite-target$", "bg")];
        assert_eq!(render("plain-name", &subs), "plain-name");
        assert_eq!(render("plain-name", &[] as &[(&str, &str)]), "plain-name");
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        assert_eq!(render("$a$/$a$", &[("$a$", "x")]), "x/x");
    }

    #[test]
    fn test_placeholders_scan() {
        assert_eq!(placeholders("$composite-target$-$mask-target$-icon"), vec![
            "$composite-target$",
            "$mask-target$",
        ]);
        assert_eq!(placeholders("no tokens"), Vec::<&str>::new());
        assert_eq!(placeholders("cost $$a$"), vec!["$a$"]);
        assert_eq!(placeholders("dangling $open"), Vec::<&str>::new());
    }

    #[test]
    fn test_name_template() {
        let template = NameTemplate::new("$composite-target$-icon");
        assert_eq!(template.placeholders(), vec!["$composite-target$"]);
        assert_eq!(template.render(&[("$composite-target$", "bg")]), "bg-icon");
    }
}
