//! Server-rendered HTML. Every piece of user text goes through `escape_html`.

use std::fmt::Write;

use parley_types::models::{ChatMessage, ChatView, Emoji, RoomSummary, User};

/// Marker rendered above the first unread message.
pub const UNREAD_MARKER: &str = "New messages";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn error_line(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\">{}</p>", escape_html(e)))
        .unwrap_or_default()
}

pub fn home(username: Option<&str>, error: Option<&str>) -> String {
    let mut body = error_line(error);
    body.push_str(&match username {
        Some(name) => format!(
            "<div>Hello, {}!</div>\n\
             <a href=\"/members\">Go to Members Area</a><br>\n\
             <a href=\"/logout\">Logout</a>",
            escape_html(name)
        ),
        None => "<a href=\"/signup\">Sign up</a><br>\n<a href=\"/login\">Log in</a>".to_string(),
    });
    layout("Parley", &body)
}

pub fn signup(error: Option<&str>) -> String {
    let body = format!(
        "<form action=\"/signup\" method=\"POST\">\n\
         <div>create user</div>\n\
         <input type=\"text\" name=\"username\" placeholder=\"Username\"><br>\n\
         <input type=\"password\" name=\"password\" placeholder=\"Password\"><br>\n\
         {}\n\
         <button type=\"submit\">Sign Up</button>\n\
         </form>",
        error_line(error)
    );
    layout("Sign up", &body)
}

pub fn login(error: Option<&str>) -> String {
    let body = format!(
        "<form action=\"/login\" method=\"POST\">\n\
         <input type=\"text\" name=\"username\" placeholder=\"Username\"><br>\n\
         <input type=\"password\" name=\"password\" placeholder=\"Password\"><br>\n\
         <button type=\"submit\">Login</button>\n\
         </form>\n{}",
        error_line(error)
    );
    layout("Log in", &body)
}

pub fn members(username: &str) -> String {
    let body = format!(
        "<div>Hello, {}.</div>\n\
         <a href=\"/group\">Your chats</a><br>\n\
         <a href=\"/logout\">Sign out</a>",
        escape_html(username)
    );
    layout("Members", &body)
}

pub fn groups(rooms: &[RoomSummary], error: Option<&str>) -> String {
    let mut body = String::from("<h1>Your chats</h1>\n");
    body.push_str(&error_line(error));
    body.push_str("<a href=\"/addGroup\">New group</a>\n<ul class=\"groups\">\n");
    for summary in rooms {
        let _ = writeln!(
            body,
            "<li><a href=\"/chat/{}\">{}</a> <span class=\"unread\">{}</span> <span class=\"preview\">{}</span></li>",
            summary.room.id,
            escape_html(summary.room.display_name()),
            summary.unread_count,
            escape_html(&summary.preview_text),
        );
    }
    body.push_str("</ul>\n<a href=\"/members\">Back</a>");
    layout("Your chats", &body)
}

fn user_checkboxes(users: &[User]) -> String {
    let mut out = String::new();
    for user in users {
        let _ = writeln!(
            out,
            "<label><input type=\"checkbox\" name=\"users\" value=\"{}\"> {}</label><br>",
            user.id,
            escape_html(&user.username)
        );
    }
    out
}

pub fn add_group(users: &[User], error: Option<&str>) -> String {
    let body = format!(
        "<h1>New group</h1>\n{}\
         <form action=\"/addGroup\" method=\"POST\">\n\
         <input type=\"text\" name=\"groupName\" placeholder=\"Group name\"><br>\n\
         {}\
         <button type=\"submit\">Create</button>\n\
         </form>\n<a href=\"/group\">Back</a>",
        error_line(error),
        user_checkboxes(users)
    );
    layout("New group", &body)
}

fn render_message(out: &mut String, entry: &ChatMessage, catalog: &[Emoji]) {
    let message = &entry.message;
    if entry.unread_start {
        let _ = writeln!(out, "<div class=\"unread-marker\">{}</div>", UNREAD_MARKER);
    }
    let _ = writeln!(
        out,
        "<div class=\"message\" id=\"message-{}\"><strong>{}</strong> <time>{}</time>\n<p>{}</p>",
        message.id,
        escape_html(&message.author_username),
        message.sent_at.format("%Y-%m-%d %H:%M"),
        escape_html(message.text.as_deref().unwrap_or_default()),
    );

    out.push_str("<div class=\"reactions\">\n");
    for emoji in catalog {
        let tally = entry.reactions.get(&emoji.name).copied().unwrap_or_default();
        let class = if tally.reacted_by_viewer { "reacted" } else { "" };
        let count = if tally.count > 0 { format!(" {}", tally.count) } else { String::new() };
        let _ = writeln!(
            out,
            "<form action=\"/react/{}\" method=\"POST\" style=\"display:inline\">\
             <input type=\"hidden\" name=\"emoji_name\" value=\"{}\">\
             <button type=\"submit\" class=\"{}\">{}{}</button></form>",
            message.id,
            escape_html(&emoji.name),
            class,
            escape_html(&emoji.name),
            count,
        );
    }
    out.push_str("</div>\n</div>\n");
}

pub fn chat(view: &ChatView, error: Option<&str>) -> String {
    let room_id = view.room.id;
    let mut body = format!("<h1>{}</h1>\n", escape_html(view.room.display_name()));
    body.push_str(&error_line(error));

    body.push_str("<section class=\"read\">\n");
    for entry in &view.read {
        render_message(&mut body, entry, &view.emoji);
    }
    body.push_str("</section>\n<section class=\"unread\">\n");
    for entry in &view.unread {
        render_message(&mut body, entry, &view.emoji);
    }
    body.push_str("</section>\n");

    let _ = write!(
        body,
        "<form action=\"/sendMessage/{}\" method=\"POST\">\n\
         <input type=\"text\" name=\"text\" placeholder=\"Message\">\n\
         <button type=\"submit\">Send</button>\n\
         </form>\n",
        room_id
    );

    if !view.invitable.is_empty() {
        let _ = write!(
            body,
            "<form action=\"/inviteUsers/{}\" method=\"POST\">\n<h2>Invite</h2>\n{}\
             <button type=\"submit\">Invite</button>\n</form>\n",
            room_id,
            user_checkboxes(&view.invitable)
        );
    }

    body.push_str("<a href=\"/group\">Back to chats</a>");
    layout(view.room.display_name(), &body)
}

pub fn not_found() -> String {
    layout(
        "Not found",
        "<h1>404 - Page Not Found</h1>\n\
         <p>The page you are looking for does not exist.</p>\n\
         <a href=\"/\">Return to Home</a>",
    )
}
