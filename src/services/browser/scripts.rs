//! In-page Scripts
//!
//! JavaScript evaluated in the dashboard page. Every script returns a JSON
//! string so results cross the CDP boundary as plain text. Arguments are
//! embedded as JSON literals.

use control_sweep_core::{CoreResult, Feedback, MutationPlan, FINGERPRINT_ATTR};

/// Candidate element query. Filtering happens in Rust.
const CANDIDATES: &str = "button, input, select, textarea, [role=button], [role=combobox], [role=switch], [contenteditable], [contenteditable=true]";

/// Chat surface hooks.
pub const CHAT_INPUT: &str = "[data-testid=\"chat-input\"]";
pub const CHAT_SEND: &str = "[data-testid=\"chat-send\"]";
pub const ASSISTANT_MESSAGE: &str = "[data-testid=\"chat-message-assistant\"]";
pub const MODEL_PICKER: &str = "select#chat-model, [data-testid=\"chat-model-select\"]";

fn js(value: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Shared helpers prepended to element scripts.
const PRELUDE: &str = r#"
const __visible = (el) => {
  const s = getComputedStyle(el);
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0 && s.display !== 'none' && s.visibility !== 'hidden'
    && parseFloat(s.opacity || '1') > 0 && el.getAttribute('aria-hidden') !== 'true';
};
const __setNative = (el, value) => {
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
    : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
    : HTMLInputElement.prototype;
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
};
"#;

/// Collect raw facts for every candidate element, in document order. The
/// candidate list is kept on `window` so a following stamp script can address
/// elements by index.
pub fn discover() -> String {
    format!(
        r#"(() => {{
{prelude}
const labelOf = (el) => {{
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  const by = el.getAttribute('aria-labelledby');
  if (by) {{
    const t = by.split(/\s+/).map(id => document.getElementById(id)).filter(Boolean).map(n => n.innerText).join(' ');
    if (t.trim()) return t;
  }}
  if (el.labels && el.labels.length) return el.labels[0].innerText;
  if (el.placeholder) return el.placeholder;
  const placeholder = el.getAttribute('data-placeholder');
  if (placeholder) return placeholder;
  const showsValue = el.isContentEditable || el.getAttribute('role') === 'combobox'
    || el.tagName === 'SELECT' || el.tagName === 'TEXTAREA';
  const text = (el.innerText || '').trim();
  if (text && !showsValue) return text.slice(0, 120);
  return el.getAttribute('title') || '';
}};
const nodes = Array.from(document.querySelectorAll({candidates}));
window.__sweepCandidates = nodes;
return JSON.stringify(nodes.map((el, index) => {{
  const s = getComputedStyle(el);
  const r = el.getBoundingClientRect();
  const type = el.getAttribute('type');
  const checkable = type === 'checkbox' || type === 'radio';
  const role = el.getAttribute('role');
  return {{
    index,
    tag: el.tagName.toLowerCase(),
    type: type,
    role: role,
    id: el.id || null,
    name: el.getAttribute('name'),
    label: labelOf(el),
    testId: el.getAttribute('data-testid'),
    value: el.isContentEditable ? el.innerText : (el.value === undefined ? null : String(el.value)),
    checked: checkable ? !!el.checked : (role === 'switch' ? el.getAttribute('aria-checked') === 'true' : null),
    disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
    contentEditable: !!el.isContentEditable,
    display: s.display,
    visibility: s.visibility,
    opacity: parseFloat(s.opacity || '1'),
    width: r.width,
    height: r.height,
    ariaHidden: el.getAttribute('aria-hidden') === 'true' || !!el.closest('[aria-hidden="true"]'),
    min: el.getAttribute('min'),
    max: el.getAttribute('max'),
    step: el.getAttribute('step'),
    options: el.tagName === 'SELECT' ? Array.from(el.options).map(o => o.value) : [],
  }};
}}));
}})()"#,
        prelude = PRELUDE,
        candidates = js(CANDIDATES),
    )
}

/// Stamp `(index, token)` pairs from the last discovery onto their elements.
pub fn stamp(pairs: &[(usize, String)]) -> String {
    let payload = serde_json::to_string(pairs).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
const nodes = window.__sweepCandidates || [];
let stamped = 0;
for (const [index, token] of {payload}) {{
  const el = nodes[index];
  if (el) {{ el.setAttribute({attr}, token); stamped += 1; }}
}}
return JSON.stringify(stamped);
}})()"#,
        payload = payload,
        attr = js(FINGERPRINT_ATTR),
    )
}

/// Live state of one element, or `null`.
pub fn inspect(selector: &str) -> String {
    format!(
        r#"(() => {{
{prelude}
const el = document.querySelector({selector});
if (!el) return JSON.stringify(null);
const type = el.getAttribute('type');
const role = el.getAttribute('role');
const checked = (type === 'checkbox' || type === 'radio') ? !!el.checked
  : (role === 'switch' ? el.getAttribute('aria-checked') === 'true' : null);
return JSON.stringify({{
  value: el.isContentEditable ? el.innerText : (el.value === undefined ? null : String(el.value)),
  checked,
  disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
  visible: __visible(el),
}});
}})()"#,
        prelude = PRELUDE,
        selector = js(selector),
    )
}

/// Apply one mutation plan. Returns `{ok, error}`.
pub fn mutate(selector: &str, plan: &MutationPlan) -> CoreResult<String> {
    let plan_json = serde_json::to_string(plan)?;
    Ok(format!(
        r#"(() => {{
{prelude}
const el = document.querySelector({selector});
if (!el) return JSON.stringify({{ ok: false, error: 'element not found' }});
const plan = {plan};
el.scrollIntoView({{ block: 'center' }});
switch (plan.op) {{
  case 'toggle': {{
    const type = el.getAttribute('type');
    const current = (type === 'checkbox' || type === 'radio') ? !!el.checked : el.getAttribute('aria-checked') === 'true';
    if (current !== plan.checked) el.click();
    break;
  }}
  case 'set_value':
  case 'fill':
  case 'select_option':
    if (el.isContentEditable) {{
      el.focus();
      el.innerText = plan.value;
      el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    }} else {{
      el.focus();
      __setNative(el, plan.value);
      el.blur();
    }}
    break;
  case 'click':
    el.click();
    break;
  default:
    return JSON.stringify({{ ok: false, error: 'unknown plan ' + plan.op }});
}}
return JSON.stringify({{ ok: true, error: null }});
}})()"#,
        prelude = PRELUDE,
        selector = js(selector),
        plan = plan_json,
    ))
}

/// Click a visible, enabled apply/save affordance if present. Returns
/// `{clicked}` and marks the button for [`apply_pending`].
pub fn apply() -> String {
    format!(
        r#"(() => {{
{prelude}
const pattern = /^(apply|save)( all)?( changes| settings| configuration)?$/i;
const buttons = Array.from(document.querySelectorAll('button, [role=button]'));
const target = buttons.find(b => pattern.test((b.innerText || b.getAttribute('aria-label') || '').trim())
  && __visible(b) && !b.disabled && b.getAttribute('aria-disabled') !== 'true');
if (!target) return JSON.stringify({{ clicked: false }});
target.setAttribute('data-sweep-apply', 'pending');
target.click();
return JSON.stringify({{ clicked: true }});
}})()"#,
        prelude = PRELUDE,
    )
}

/// Whether the last clicked apply affordance is still busy.
pub fn apply_pending() -> String {
    r#"(() => {
const b = document.querySelector('[data-sweep-apply="pending"]');
if (!b) return JSON.stringify(false);
const busy = b.disabled || b.getAttribute('aria-busy') === 'true' || /saving|applying/i.test(b.innerText || '');
if (!busy) b.removeAttribute('data-sweep-apply');
return JSON.stringify(busy);
})()"#
        .to_string()
}

/// Document loaded and the application root has content.
pub fn ready() -> String {
    r#"(() => JSON.stringify(document.readyState === 'complete' && !!document.body && document.body.children.length > 0))()"#
        .to_string()
}

/// The surface shows visible text.
pub fn rendered() -> String {
    r#"(() => JSON.stringify(!!document.body && (document.body.innerText || '').trim().length > 0))()"#
        .to_string()
}

/// Number of assistant messages.
pub fn assistant_count() -> String {
    format!(
        "(() => JSON.stringify(document.querySelectorAll({}).length))()",
        js(ASSISTANT_MESSAGE)
    )
}

/// Text of the assistant message at `index`, or `null`.
pub fn assistant_text(index: usize) -> String {
    format!(
        r#"(() => {{
const nodes = document.querySelectorAll({selector});
const el = nodes[{index}];
if (!el) return JSON.stringify(null);
const busy = el.getAttribute('aria-busy') === 'true' || el.getAttribute('data-streaming') === 'true';
return JSON.stringify({{ text: el.innerText || '', streaming: busy }});
}})()"#,
        selector = js(ASSISTANT_MESSAGE),
        index = index,
    )
}

/// Type a question into the chat input and send it.
pub fn submit_question(question: &str) -> String {
    format!(
        r#"(() => {{
{prelude}
const input = document.querySelector({input});
const send = document.querySelector({send});
if (!input) return JSON.stringify({{ ok: false, error: 'chat input not found' }});
input.focus();
__setNative(input, {question});
if (send) {{ send.click(); }}
else {{ input.dispatchEvent(new KeyboardEvent('keydown', {{ key: 'Enter', bubbles: true }})); }}
return JSON.stringify({{ ok: true, error: null }});
}})()"#,
        prelude = PRELUDE,
        input = js(CHAT_INPUT),
        send = js(CHAT_SEND),
        question = js(question),
    )
}

/// Click the feedback control of the latest assistant message.
pub fn send_feedback(feedback: Feedback) -> String {
    let selector = format!("[data-testid=\"feedback-{}\"]", feedback);
    format!(
        r#"(() => {{
const messages = document.querySelectorAll({messages});
const last = messages[messages.length - 1];
const scoped = last ? last.querySelector({selector}) : null;
const all = document.querySelectorAll({selector});
const button = scoped || all[all.length - 1];
if (!button) return JSON.stringify({{ ok: false, error: 'feedback control not found' }});
button.click();
return JSON.stringify({{ ok: true, error: null }});
}})()"#,
        messages = js(ASSISTANT_MESSAGE),
        selector = js(&selector),
    )
}

/// Switch the chat model picker to `model_id`.
pub fn select_model(model_id: &str) -> String {
    format!(
        r#"(() => {{
{prelude}
const picker = document.querySelector({picker});
if (!picker) return JSON.stringify({{ ok: false, error: 'model picker not found' }});
const id = {model};
if (picker.tagName === 'SELECT' && !Array.from(picker.options).some(o => o.value === id)) {{
  return JSON.stringify({{ ok: false, error: 'model not offered: ' + id }});
}}
__setNative(picker, id);
return JSON.stringify({{ ok: true, error: null }});
}})()"#,
        prelude = PRELUDE,
        picker = js(MODEL_PICKER),
        model = js(model_id),
    )
}
