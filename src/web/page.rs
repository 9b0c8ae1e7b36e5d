//! HTML rendering for the dashboard.
//!
//! A [`PageState`] is assembled for each request, rendered once and dropped;
//! nothing about the page outlives the response.

use std::fmt::Write as _;

use crate::catalog::{ArtifactFile, ArtifactSlot, SessionEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
}

impl FlashLevel {
    fn css(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

impl Flash {
    pub fn new(level: FlashLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Everything one render of the dashboard needs.
#[derive(Debug, Clone)]
pub struct PageState {
    pub url: String,
    pub name: String,
    pub show_mix: bool,
    pub show_stems: bool,
    pub flash: Option<Flash>,
    pub sessions: Vec<SessionEntry>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            url: String::new(),
            name: String::new(),
            show_mix: true,
            show_stems: false,
            flash: None,
            sessions: Vec::new(),
        }
    }
}

/// File name offered when downloading `art` from `session`.
pub fn download_name(session: &str, art: &ArtifactFile) -> String {
    match art.slot {
        ArtifactSlot::Mix => format!("{session}_mix.{}", art.format.extension()),
        ArtifactSlot::Stem(_) => format!("{session}_{}", art.file_name),
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex}\
aside{width:18rem;padding:1rem;background:#f3f3f5;min-height:100vh}\
main{flex:1;padding:1rem 2rem}\
label{display:block;margin-top:.6rem}\
input[type=text]{width:100%}\
.session{border:1px solid #ddd;border-radius:6px;padding:.8rem;margin-bottom:1rem}\
.flash{padding:.6rem;border-radius:4px;margin-bottom:1rem}\
.success{background:#e3f6e5}.warning{background:#fff4d6}.error{background:#fde2e2}";

pub fn render(state: &PageState) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!doctype html><html><head><meta charset=\"utf-8\"><title>stemdeck</title>");
    let _ = write!(html, "<style>{STYLE}</style></head><body>");
    render_sidebar(&mut html, state);
    html.push_str("<main><h1>Separated songs</h1>");
    if let Some(flash) = &state.flash {
        let _ = write!(
            html,
            "<div class=\"flash {}\">{}</div>",
            flash.level.css(),
            escape(&flash.text)
        );
    }
    if state.sessions.is_empty() {
        html.push_str("<p class=\"empty\">No sessions found yet. Use the form to add one.</p>");
    }
    for session in &state.sessions {
        render_session(&mut html, state, session);
    }
    html.push_str("</main></body></html>");
    html
}

fn checked(on: bool) -> &'static str {
    if on {
        " checked"
    } else {
        ""
    }
}

fn render_sidebar(html: &mut String, state: &PageState) {
    let _ = write!(
        html,
        "<aside><h2>stemdeck</h2>\
         <form method=\"post\" action=\"/process\">\
         <label>Video URL<input type=\"text\" name=\"url\" value=\"{url}\"></label>\
         <label>Song name<input type=\"text\" name=\"name\" value=\"{name}\"></label>\
         <input type=\"hidden\" name=\"view\" value=\"1\">\
         <label><input type=\"checkbox\" name=\"show_mix\"{mix}> Show mix</label>\
         <label><input type=\"checkbox\" name=\"show_stems\"{stems}> Show individual stems</label>\
         <p><button type=\"submit\">Start processing</button></p>\
         </form>\
         <form method=\"get\" action=\"/\">\
         <input type=\"hidden\" name=\"view\" value=\"1\">\
         <label><input type=\"checkbox\" name=\"show_mix\"{mix}> Show mix</label>\
         <label><input type=\"checkbox\" name=\"show_stems\"{stems}> Show individual stems</label>\
         <p><button type=\"submit\">Refresh gallery</button></p>\
         </form></aside>",
        url = escape(&state.url),
        name = escape(&state.name),
        mix = checked(state.show_mix),
        stems = checked(state.show_stems),
    );
}

fn render_artifact(html: &mut String, session: &str, art: &ArtifactFile, title: &str) {
    let _ = write!(
        html,
        "<div class=\"artifact\"><strong>{title}</strong>\
         <audio controls preload=\"none\" src=\"/sessions/{s}/{f}\"></audio> \
         <a href=\"/sessions/{s}/{f}/download\" download=\"{dl}\">Download</a></div>",
        title = escape(title),
        s = escape(session),
        f = escape(&art.file_name),
        dl = escape(&download_name(session, art)),
    );
}

fn render_session(html: &mut String, state: &PageState, session: &SessionEntry) {
    let _ = write!(
        html,
        "<section class=\"session\"><h3>{}</h3>",
        escape(&session.name)
    );
    if state.show_mix {
        if let Some(mix) = session.mix() {
            render_artifact(html, &session.name, mix, "MIX");
        }
    }
    if state.show_stems {
        html.push_str("<details><summary>Individual stems</summary>");
        for art in session.stems() {
            let title = art.slot.file_stem().to_uppercase();
            render_artifact(html, &session.name, art, &title);
        }
        html.push_str("</details>");
    }
    html.push_str("</section>");
}
