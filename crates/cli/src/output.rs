//! Terminal rendering helpers for defs, refs, and delta listings.

use chrono::{DateTime, Utc};
use colored::Colorize;
use xref_core::backend::Person;
use xref_core::Def;

/// Render a def the way search results show it: keyword, name, and type
/// at the scope appropriate for where the def comes from.
pub fn fmt_def_name(def: &Def, from_dep: bool) -> String {
    let f = match &def.fmt {
        Some(f) => f,
        None => return def.name.clone(),
    };

    let mut kw = f.def_keyword.clone();
    if !kw.is_empty() {
        kw.push(' ');
    }

    let name = if from_dep {
        &f.name.language_wide_qualified
    } else {
        &f.name.dep_qualified
    };
    let typ = if from_dep {
        &f.typ.repository_wide_qualified
    } else {
        &f.typ.dep_qualified
    };

    format!(
        "{}{}{}{}",
        kw,
        name.red().bold(),
        f.name_and_type_separator,
        typ.bold()
    )
}

/// Render a def in a delta listing (always dep-qualified).
pub fn fmt_delta_def(def: &Def) -> String {
    let f = match &def.fmt {
        Some(f) => f,
        None => return def.name.clone(),
    };

    let mut kw = f.def_keyword.clone();
    if !kw.is_empty() {
        kw.push(' ');
    }
    format!(
        "{}{}{}{}",
        kw,
        f.name.dep_qualified.bold(),
        f.name_and_type_separator,
        f.typ.dep_qualified
    )
}

pub fn fmt_person(p: &Person) -> String {
    if p.login.is_empty() {
        return p.name.clone();
    }
    if p.name.is_empty() {
        return p.login.clone();
    }
    format!("{} ({})", p.login, p.name)
}

/// Drop paragraph markup from service-rendered doc HTML.
pub fn strip_html(html: &str) -> String {
    html.replace("<p>", "")
        .replace("</p>", "")
        .replace("\n\n", "\n")
}

pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bold every occurrence of a def name inside a source snippet.
pub fn highlight(snippet: &str, name: &str) -> String {
    if name.is_empty() {
        return snippet.to_string();
    }
    snippet.replace(name, &name.yellow().bold().to_string())
}

/// Human-scale "how long ago" for build timestamps.
pub fn ago(t: DateTime<Utc>) -> String {
    let delta = Utc::now().signed_duration_since(t);
    if delta.num_days() > 0 {
        format!("{}d ago", delta.num_days())
    } else if delta.num_hours() > 0 {
        format!("{}h ago", delta.num_hours())
    } else if delta.num_minutes() > 0 {
        format!("{}m ago", delta.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xref_core::{DefFmtStrings, QualFormats};

    fn formatted_def() -> Def {
        Def {
            name: "new".into(),
            kind: "fn".into(),
            fmt: Some(DefFmtStrings {
                def_keyword: "fn".into(),
                name: QualFormats {
                    unqualified: "new".into(),
                    scope_qualified: "Widget::new".into(),
                    dep_qualified: "widget::Widget::new".into(),
                    repository_wide_qualified: "app/widget::Widget::new".into(),
                    language_wide_qualified: "github.com/a/app/widget::Widget::new".into(),
                },
                typ: QualFormats {
                    dep_qualified: "(usize) -> Widget".into(),
                    repository_wide_qualified: "(usize) -> widget::Widget".into(),
                    ..QualFormats::default()
                },
                name_and_type_separator: " ".into(),
                language: "rust".into(),
            }),
            ..Def::default()
        }
    }

    #[test]
    fn test_fmt_def_name_scopes() {
        colored::control::set_override(false);
        let def = formatted_def();
        let local = fmt_def_name(&def, false);
        assert!(local.contains("widget::Widget::new"));
        assert!(local.contains("(usize) -> Widget"));

        let dep = fmt_def_name(&def, true);
        assert!(dep.contains("github.com/a/app/widget::Widget::new"));
        assert!(dep.contains("(usize) -> widget::Widget"));
    }

    #[test]
    fn test_fmt_falls_back_to_bare_name() {
        colored::control::set_override(false);
        let def = Def {
            name: "plain".into(),
            ..Def::default()
        };
        assert_eq!(fmt_def_name(&def, false), "plain");
        assert_eq!(fmt_delta_def(&def), "plain");
    }

    #[test]
    fn test_fmt_person() {
        let full = Person {
            login: "ada".into(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        };
        assert_eq!(fmt_person(&full), "ada (Ada Lovelace)");

        let login_only = Person {
            login: "ada".into(),
            ..Person::default()
        };
        assert_eq!(fmt_person(&login_only), "ada");

        let transient = Person {
            name: "Anonymous".into(),
            ..Person::default()
        };
        assert_eq!(fmt_person(&transient), "Anonymous");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>First.</p>\n\n<p>Second.</p>"),
            "First.\nSecond."
        );
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
    }

    #[test]
    fn test_highlight() {
        colored::control::set_override(false);
        assert_eq!(highlight("let w = Widget::new();", "Widget"), "let w = Widget::new();");
        assert_eq!(highlight("anything", ""), "anything");
    }
}
