use std::fmt::Write;

use crate::features::FEATURE_NAMES;

const STYLE: &str = "
body { font-family: sans-serif; max-width: 40em; margin: 2em auto; }
label { display: inline-block; width: 8em; }
.flash { padding: 0.5em; background: #fee; border: 1px solid #c99; }
#result { font-weight: bold; margin-top: 1em; }
";

pub fn home(username: &str) -> String {
    let mut inputs = String::new();
    for name in FEATURE_NAMES {
        let _ = writeln!(
            inputs,
            r#"<p><label for="{name}">{name}</label><input id="{name}" name="{name}" required></p>"#
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Heart Attack Risk</title><style>{STYLE}</style></head>
<body>
<p>Logged in as {user} (<a href="/logout">log out</a>)</p>
<h1>Heart Attack Risk</h1>
<form id="features">
{inputs}<button type="submit">Predict</button>
</form>
<div id="result"></div>
<script>
document.getElementById("features").addEventListener("submit", async (ev) => {{
    ev.preventDefault();
    const body = Object.fromEntries(new FormData(ev.target));
    const res = await fetch("/predict", {{
        method: "POST",
        headers: {{ "Content-Type": "application/json" }},
        body: JSON.stringify(body),
    }});
    const json = await res.json();
    document.getElementById("result").textContent = json.prediction_text;
}});
</script>
</body>
</html>
"#,
        user = escape(username),
    )
}

pub fn login(message: Option<&str>) -> String {
    let flash = match message {
        Some(msg) => format!(r#"<p class="flash">{}</p>"#, escape(msg)),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Log in</title><style>{STYLE}</style></head>
<body>
{flash}
<h1>Log in</h1>
<form method="post" action="/login">
<p><label for="login-user">Username</label><input id="login-user" name="username" required></p>
<p><label for="login-pass">Password</label><input id="login-pass" name="password" type="password" required></p>
<button type="submit">Log in</button>
</form>
<h2>Register</h2>
<form method="post" action="/register">
<p><label for="reg-user">Username</label><input id="reg-user" name="username" required></p>
<p><label for="reg-pass">Password</label><input id="reg-pass" name="password" type="password" required></p>
<button type="submit">Register</button>
</form>
</body>
</html>
"#
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
