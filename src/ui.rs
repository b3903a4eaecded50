use crate::form::{DayForm, FieldInput};
use crate::models::{FieldName, GroupStatus};
use crate::tracker::{Screen, ViewSnapshot};

pub fn render_page(view: &ViewSnapshot) -> String {
    let mut body = String::new();
    body.push_str(&overlay(view.overlay.as_deref()));
    body.push_str(&banner(view.notice.as_deref()));
    match view.screen {
        Screen::Auth => body.push_str(AUTH_UI),
        Screen::Tracker => body.push_str(&tracker_ui(view)),
    }
    page(view.theme.map(|theme| theme.as_str()), &body)
}

/// Page shown when the backend could not be set up; both main regions stay hidden.
pub fn render_startup_error(message: &str) -> String {
    page(None, &banner(Some(message)))
}

fn page(theme: Option<&str>, body: &str) -> String {
    let theme_attr = theme
        .map(|theme| format!(" data-theme=\"{theme}\""))
        .unwrap_or_default();
    PAGE_HTML
        .replace("{{THEME}}", &theme_attr)
        .replace("{{BODY}}", body)
}

fn overlay(message: Option<&str>) -> String {
    let class = if message.is_some() { "overlay show" } else { "overlay" };
    format!(
        "<div id=\"overlay\" class=\"{class}\">{}</div>",
        escape_html(message.unwrap_or_default())
    )
}

fn banner(message: Option<&str>) -> String {
    let class = if message.is_some() { "banner show" } else { "banner" };
    format!(
        "<div id=\"banner\" class=\"{class}\" role=\"status\">{}</div>",
        escape_html(message.unwrap_or_default())
    )
}

fn tracker_ui(view: &ViewSnapshot) -> String {
    let disabled = if view.nav_enabled { "" } else { " disabled" };
    let mut html = format!(
        r#"<section id="tracker-ui">
  <header class="toolbar">
    <form method="post" action="/day/previous"><button data-nav{disabled}>&larr; Prev</button></form>
    <h1 id="day-label">{label}</h1>
    <form method="post" action="/day/next"><button data-nav{disabled}>Next &rarr;</button></form>
  </header>
  <div class="actions">
    <form method="post" action="/day/today"><button data-nav{disabled}>Today</button></form>
    <form method="post" action="/theme"><button>Theme</button></form>
    <form method="post" action="/logout"><button>Log out{email}</button></form>
  </div>
  <div id="workout-form">"#,
        label = escape_html(&view.day_label),
        email = view
            .user_email
            .as_deref()
            .map(|email| format!(" ({})", escape_html(email)))
            .unwrap_or_default(),
    );
    match &view.form {
        Some(form) => html.push_str(&workout_form(form)),
        None if view.load_failed => {
            html.push_str("<p class=\"load-error\">Error loading data. Please try again.</p>")
        }
        None => {}
    }
    html.push_str("</div>\n</section>");
    html
}

fn workout_form(form: &DayForm) -> String {
    let mut html = String::new();
    for block in &form.exercises {
        html.push_str(&format!(
            "<div class=\"exercise-block\"><div class=\"exercise-title\">{}</div>",
            escape_html(block.name)
        ));
        for row in &block.sets {
            html.push_str(&format!("<div class=\"set-row\" title=\"Set {}\">", row.set));
            for field in &row.fields {
                html.push_str(&field_input(block.code.as_str(), row.set, row.status, field));
            }
            if let Some(error) = &row.error {
                html.push_str(&format!(
                    "<span class=\"set-error\">{}</span>",
                    escape_html(error)
                ));
            }
            html.push_str("</div>");
        }
        html.push_str("</div>");
    }
    html
}

fn field_input(exercise: &str, set: u8, status: GroupStatus, field: &FieldInput) -> String {
    let mut classes = Vec::new();
    if field.filled {
        classes.push("filled");
    }
    if status != GroupStatus::Clean {
        classes.push(status.as_str());
    }
    let attrs = format!(
        "class=\"{}\" placeholder=\"{}\" data-exercise=\"{exercise}\" data-set=\"{set}\" data-field=\"{}\"",
        classes.join(" "),
        field.name.placeholder(),
        field.name.as_str(),
    );
    let value = escape_html(&field.value);
    match field.name {
        FieldName::Notes => format!("<textarea rows=\"1\" {attrs}>{value}</textarea>"),
        FieldName::Reps => format!("<input type=\"number\" step=\"1\" {attrs} value=\"{value}\" />"),
        FieldName::Weight => format!("<input type=\"number\" step=\"any\" {attrs} value=\"{value}\" />"),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const AUTH_UI: &str = r#"<section id="auth-ui">
  <h1>Workout Tracker</h1>
  <form id="login-form" method="post" action="/login">
    <input id="email" name="email" type="email" placeholder="Email" autocomplete="username" required />
    <input id="password" name="password" type="password" placeholder="Password" autocomplete="current-password" required />
    <button type="submit">Log in</button>
  </form>
</section>"#;

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en"{{THEME}}>
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Workout Tracker</title>
  <style>
    :root {
      --bg: #f6f4ef;
      --card: #ffffff;
      --ink: #22262b;
      --muted: #7b8088;
      --accent: #2f6f5e;
      --dirty: #e0a100;
      --saving: #3a7bd5;
      --saved: #2f9e5b;
      --error: #c0392b;
    }

    @media (prefers-color-scheme: dark) {
      :root:not([data-theme="light"]) {
        --bg: #16181c;
        --card: #21252b;
        --ink: #e8e6e1;
        --muted: #9aa0a8;
      }
    }

    :root[data-theme="dark"] {
      --bg: #16181c;
      --card: #21252b;
      --ink: #e8e6e1;
      --muted: #9aa0a8;
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      padding: 24px 16px 48px;
    }

    section { max-width: 720px; margin: 0 auto; }
    .hidden { display: none; }

    .toolbar, .actions { display: flex; align-items: center; justify-content: space-between; gap: 12px; }
    .actions { justify-content: flex-end; margin: 12px 0 20px; }
    .toolbar form, .actions form { margin: 0; }
    h1 { font-size: 1.3rem; margin: 0; text-align: center; }

    button {
      border: none;
      border-radius: 999px;
      padding: 8px 16px;
      background: var(--accent);
      color: #fff;
      cursor: pointer;
    }
    button:disabled { opacity: 0.45; cursor: not-allowed; }

    #login-form { display: grid; gap: 12px; margin-top: 20px; }

    .exercise-block {
      background: var(--card);
      border-radius: 16px;
      padding: 14px 16px;
      margin-bottom: 14px;
    }
    .exercise-title { font-weight: 600; margin-bottom: 8px; }
    .set-row { display: flex; gap: 8px; margin-bottom: 6px; align-items: center; flex-wrap: wrap; }
    .set-error { color: var(--error); font-size: 0.8rem; }

    input, textarea {
      flex: 1;
      min-width: 72px;
      padding: 8px 10px;
      border-radius: 10px;
      border: 2px solid transparent;
      background: var(--bg);
      color: var(--ink);
      font: inherit;
    }
    textarea { flex: 2; resize: vertical; }
    .filled { background: color-mix(in srgb, var(--accent) 12%, var(--bg)); }
    .dirty { border-color: var(--dirty); }
    .saving { border-color: var(--saving); }
    .saved { border-color: var(--saved); }

    .banner, .overlay { display: none; }
    .banner.show {
      display: block;
      max-width: 720px;
      margin: 0 auto 16px;
      padding: 10px 14px;
      border-radius: 12px;
      background: color-mix(in srgb, var(--error) 15%, var(--card));
    }
    .overlay.show {
      display: grid;
      place-items: center;
      position: fixed;
      inset: 0;
      background: rgba(0, 0, 0, 0.35);
      color: #fff;
      font-size: 1.1rem;
    }
    .load-error { color: var(--error); }
  </style>
</head>
<body>
{{BODY}}
  <script>
    const form = document.getElementById('workout-form');
    const banner = document.getElementById('banner');
    const overlay = document.getElementById('overlay');
    const STATUS_CLASSES = ['dirty', 'saving', 'saved'];
    const editChains = new Map();
    let lastSeq = 0;

    // Microseconds since the epoch keep sequences increasing across reloads.
    const nextSeq = () => {
      const now = Math.round((performance.timeOrigin + performance.now()) * 1000);
      lastSeq = Math.max(lastSeq + 1, now);
      return lastSeq;
    };

    const showBanner = (message) => {
      banner.textContent = message;
      banner.classList.add('show');
    };

    const hideBanner = () => banner.classList.remove('show');

    const groupFields = (exercise, set) =>
      form.querySelectorAll(`[data-exercise="${exercise}"][data-set="${set}"]`);

    const setStatus = (exercise, set, status) => {
      groupFields(exercise, set).forEach((el) => {
        el.classList.remove(...STATUS_CLASSES);
        if (STATUS_CLASSES.includes(status)) {
          el.classList.add(status);
        }
      });
    };

    const sendEdit = async (el, value, seq) => {
      const res = await fetch('/api/field', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({
          exercise: el.dataset.exercise,
          set: Number(el.dataset.set),
          field: el.dataset.field,
          value,
          seq
        })
      });
      if (!res.ok) {
        throw new Error((await res.text()) || 'Edit rejected');
      }
    };

    const refresh = async () => {
      const res = await fetch('/api/view');
      if (!res.ok) {
        return;
      }
      const view = await res.json();
      document.querySelectorAll('[data-nav]').forEach((button) => {
        button.disabled = !view.nav_enabled;
      });
      if (view.notice) {
        showBanner(view.notice);
      } else {
        hideBanner();
      }
      overlay.classList.toggle('show', Boolean(view.overlay));
      if (form && view.form) {
        view.form.exercises.forEach((block) => {
          block.sets.forEach((row) => setStatus(block.code, row.set, row.status));
        });
      }
    };

    if (form) {
      form.addEventListener('input', (event) => {
        const el = event.target;
        if (!el.dataset.field) {
          return;
        }
        el.classList.toggle('filled', el.value !== '');
        setStatus(el.dataset.exercise, el.dataset.set, 'dirty');
        const group = `${el.dataset.exercise}-${el.dataset.set}`;
        const value = el.value;
        const seq = nextSeq();
        const previous = editChains.get(group) || Promise.resolve();
        const next = previous
          .then(() => sendEdit(el, value, seq))
          .catch((err) => showBanner(err.message));
        editChains.set(group, next);
      });
      setInterval(() => refresh().catch(() => {}), 700);
    }
  </script>
</body>
</html>
"#;
