//! Server-rendered HTML for the sign-in page and the inbox.

use std::fmt::Write;

use inbox_gateway::controller::{ContactEntry, InboxView};
use inbox_types::models::{Message, User};
use inbox_types::profile::{CONTACT_JOINED, CONTACT_PHONE, ContactProfile, ContactStatus, contact_email, initials};

const STYLE: &str = "
body{margin:0;font-family:system-ui,sans-serif;background:#f3f4f6;color:#111827}
.app{display:flex;height:100vh}
.contacts{width:16rem;background:#fff;border-right:1px solid #e5e7eb;overflow-y:auto}
.contacts h2,.header h2{margin:0;font-size:1.25rem}
.pad{padding:1rem}
.contact{display:flex;gap:.75rem;padding:.75rem;color:inherit;text-decoration:none}
.contact:hover,.contact.selected{background:#f3f4f6}
.avatar{flex:none;width:2.5rem;height:2.5rem;border-radius:50%;background:#e5e7eb;display:flex;align-items:center;justify-content:center;font-weight:600}
.avatar.large{width:5rem;height:5rem;margin:0 auto;font-size:1.5rem}
.preview{font-size:.875rem;color:#6b7280;white-space:nowrap;overflow:hidden;text-overflow:ellipsis}
.unread{background:#3b82f6;color:#fff;font-size:.75rem;border-radius:999px;padding:0 .5rem}
.badge{display:inline-block;font-size:.75rem;border-radius:999px;padding:0 .5rem;background:#e5e7eb;margin:.125rem}
.main{flex:1;display:flex;flex-direction:column;min-width:0}
.header{background:#fff;padding:1rem;box-shadow:0 1px 2px #0001;display:flex;justify-content:space-between;align-items:center}
.body{flex:1;display:flex;overflow:hidden}
.chat{flex:1;display:flex;flex-direction:column}
.thread{flex:1;overflow-y:auto;padding:1rem}
.message{margin-bottom:1rem}
.message.founder{text-align:right}
.bubble{display:inline-block;padding:.5rem;border-radius:.5rem;background:#e5e7eb}
.founder .bubble{background:#3b82f6;color:#fff}
.time{font-size:.75rem;color:#6b7280;margin:.25rem 0 0}
.composer{display:flex;gap:.5rem;padding:1rem;background:#fff;border-top:1px solid #e5e7eb}
.composer input{flex:1}
.panel{width:20rem;background:#fff;border-left:1px solid #e5e7eb;padding:1rem;overflow-y:auto}
.panel textarea{width:100%;box-sizing:border-box}
.log{background:#f9fafb;border-radius:.25rem;padding:.5rem;margin-bottom:.5rem;font-size:.875rem}
.empty{color:#6b7280;text-align:center;margin-top:2rem}
.notice{color:#b91c1c}
";

/// Escapes text for element content and quoted attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape(title),
        STYLE,
        body
    )
}

pub fn sign_in_page(failed: bool) -> String {
    let notice = if failed {
        "<p class=\"notice\">Invalid email or password.</p>"
    } else {
        ""
    };
    let body = format!(
        "<main class=\"pad\" style=\"max-width:22rem;margin:4rem auto;background:#fff;border-radius:.5rem\">\
         <h2>Sign in</h2>{}\
         <form method=\"post\" action=\"/auth/signin\">\
         <p><input type=\"email\" name=\"email\" placeholder=\"Email\" required autofocus></p>\
         <p><input type=\"password\" name=\"password\" placeholder=\"Password\" required></p>\
         <button type=\"submit\">Sign in</button></form></main>",
        notice
    );
    page("Sign in", &body)
}

pub fn inbox_page(view: &InboxView, filter: Option<&str>, operator: Option<&str>) -> String {
    let selected_id = view.selected.as_ref().map(|u| u.id.as_str()).unwrap_or_default();
    let mut body = format!(
        "<div class=\"app\" id=\"inbox\" data-selected=\"{}\">",
        escape(selected_id)
    );
    body.push_str(&contact_list(&view.contacts, filter));
    body.push_str("<div class=\"main\">");

    match (&view.selected, &view.profile) {
        (Some(user), Some(profile)) => {
            body.push_str(&header(user, profile, operator));
            body.push_str("<div class=\"body\"><div class=\"chat\">");
            body.push_str(&thread(&view.thread));
            body.push_str(&composer(&view.draft));
            body.push_str("</div>");
            body.push_str(&panel(user, profile));
            body.push_str("</div>");
        }
        _ => {
            body.push_str(&signed_in_bar(operator));
            body.push_str("<p class=\"empty\">Select a contact to start chatting.</p>");
        }
    }

    body.push_str("</div></div><script src=\"/assets/inbox.js\"></script>");

    let title = match &view.selected {
        Some(user) => format!("{} - Inbox", user.name),
        None => "Inbox".to_string(),
    };
    page(&title, &body)
}

fn contact_list(contacts: &[ContactEntry], filter: Option<&str>) -> String {
    let mut out = format!(
        "<nav class=\"contacts\"><div class=\"pad\"><h2>Contacts</h2>\
         <form method=\"get\" action=\"/\"><input name=\"q\" placeholder=\"Search users...\" value=\"{}\"></form></div>",
        escape(filter.unwrap_or_default())
    );

    for entry in contacts {
        let class = if entry.selected { "contact selected" } else { "contact" };
        let unread = if entry.profile.unread > 0 {
            format!("<span class=\"unread\">{}</span>", entry.profile.unread)
        } else {
            String::new()
        };
        let _ = write!(
            out,
            "<a class=\"{}\" href=\"/contacts/{}\"><span class=\"avatar\">{}</span>\
             <span style=\"flex:1;min-width:0\"><span style=\"display:flex;justify-content:space-between\">\
             <strong>{}</strong>{}</span><span class=\"preview\" style=\"display:block\">{}</span>\
             <span style=\"display:block\">{}</span></span></a>",
            class,
            escape(&entry.user.id),
            escape(&initials(&entry.user.name)),
            escape(&entry.user.name),
            unread,
            escape(entry.profile.last_message.as_deref().unwrap_or_default()),
            badges(&entry.profile.tags),
        );
    }

    if contacts.is_empty() {
        out.push_str("<p class=\"empty\">No contacts.</p>");
    }
    out.push_str("</nav>");
    out
}

fn badges(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("<span class=\"badge\">{}</span>", escape(tag)))
        .collect()
}

fn signed_in_bar(operator: Option<&str>) -> String {
    format!(
        "<div class=\"header\"><h2>Inbox</h2>{}</div>",
        sign_out_form(operator)
    )
}

fn sign_out_form(operator: Option<&str>) -> String {
    format!(
        "<form method=\"post\" action=\"/signout\"><small>{}</small> <button type=\"submit\">Sign out</button></form>",
        escape(operator.unwrap_or_default())
    )
}

fn header(user: &User, profile: &ContactProfile, operator: Option<&str>) -> String {
    let options: String = ContactStatus::ALL
        .iter()
        .map(|status| {
            let selected = if *status == profile.status { " selected" } else { "" };
            format!("<option value=\"{0}\"{1}>{0}</option>", status.label(), selected)
        })
        .collect();

    format!(
        "<div class=\"header\"><h2>{}</h2><div style=\"display:flex;gap:.5rem;align-items:center\">\
         <form method=\"post\" action=\"/contacts/{}/status\"><select name=\"status\" onchange=\"this.form.submit()\">{}</select></form>\
         <span class=\"badge\">{}</span>{}</div></div>",
        escape(&user.name),
        escape(&user.id),
        options,
        profile.status,
        sign_out_form(operator)
    )
}

fn thread(messages: &[Message]) -> String {
    let mut out = String::from("<section class=\"thread\" id=\"thread\">");
    for message in messages {
        out.push_str(&message_html(message));
    }
    out.push_str("</section>");
    out
}

/// One thread entry. The client script builds the same markup for pushed rows.
pub fn message_html(message: &Message) -> String {
    let class = if message.is_founder { "message founder" } else { "message" };
    format!(
        "<div class=\"{}\" data-id=\"{}\" data-created=\"{}\"><div class=\"bubble\"><p style=\"margin:0\">{}</p></div><p class=\"time\">{}</p></div>",
        class,
        message.id,
        message.created_at.to_rfc3339(),
        escape(&message.text),
        message.created_at.format("%-I:%M %p")
    )
}

fn composer(draft: &str) -> String {
    format!(
        "<form class=\"composer\" method=\"post\" action=\"/compose\">\
         <input name=\"text\" placeholder=\"Type a message...\" autocomplete=\"off\" value=\"{}\">\
         <button type=\"submit\">Send</button></form>",
        escape(draft)
    )
}

fn panel(user: &User, profile: &ContactProfile) -> String {
    let id = escape(&user.id);
    let mut out = format!(
        "<aside class=\"panel\"><div style=\"text-align:center\"><div class=\"avatar large\">{}</div><h3>{}</h3></div><hr>\
         <p>&#128222; {}</p><p>&#9993; {}</p><p>&#128197; Joined {}</p><hr>\
         <h4>Tags</h4><div>{}</div>\
         <form method=\"post\" action=\"/contacts/{}/tags\" style=\"display:flex;gap:.5rem\">\
         <input name=\"tag\" placeholder=\"Add new tag...\"><button type=\"submit\">Add</button></form><hr>",
        escape(&initials(&user.name)),
        escape(&user.name),
        CONTACT_PHONE,
        escape(&contact_email(user)),
        CONTACT_JOINED,
        badges(&profile.tags),
        id,
    );

    let _ = write!(
        out,
        "<details open><summary>Notes</summary>\
         <form method=\"post\" action=\"/contacts/{}/notes\">\
         <textarea name=\"notes\" rows=\"4\" placeholder=\"Add notes about this user...\">{}</textarea>\
         <button type=\"submit\">Save notes</button></form></details>\
         <details><summary>Communication Log</summary>",
        id,
        escape(&profile.notes)
    );

    for entry in &profile.log {
        let _ = write!(
            out,
            "<div class=\"log\"><div style=\"display:flex;justify-content:space-between\"><strong>{}</strong><span>{}</span></div><p style=\"margin:.25rem 0 0\">{}</p></div>",
            entry.kind,
            entry.date.format("%Y-%m-%d"),
            escape(&entry.summary)
        );
    }
    if profile.log.is_empty() {
        out.push_str("<p class=\"empty\">No communication yet.</p>");
    }

    out.push_str("</details></aside>");
    out
}
