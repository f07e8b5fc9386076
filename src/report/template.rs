//! 报告模板: 样式 + 前端脚本
//! 前端只负责视图: 按类别过滤、复制时间戳、点击放大

/// HTML 转义 (文本与属性值通用)
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub const STYLE: &str = r#"
    * { box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        margin: 0;
        padding: 20px;
        background: #141824;
        color: #e6e6e6;
    }
    h1 { margin: 0 0 8px 0; color: #fff; }
    .source { color: #8a8fa3; margin-bottom: 18px; }
    .hint {
        background: #1d2335;
        padding: 14px;
        border-radius: 8px;
        margin-bottom: 18px;
        border-left: 4px solid #2f6fed;
    }
    .hint strong { color: #ff6b6b; }
    .stats { display: flex; flex-wrap: wrap; gap: 16px; margin-bottom: 18px; }
    .stat { background: #1d2335; padding: 14px 18px; border-radius: 8px; }
    .stat-value { font-size: 2em; font-weight: bold; color: #ff6b6b; }
    .stat-label { color: #8a8fa3; }
    .filters {
        position: sticky;
        top: 0;
        z-index: 100;
        background: #141824;
        padding: 10px 0;
        margin-bottom: 18px;
        border-bottom: 1px solid #2a3042;
    }
    .filter {
        background: #1d2335;
        color: #e6e6e6;
        border: 1px solid #2f6fed;
        padding: 7px 15px;
        margin: 0 8px 6px 0;
        border-radius: 18px;
        cursor: pointer;
    }
    .filter:hover { background: #2a3042; }
    .filter.active { background: #ff6b6b; border-color: #ff6b6b; }
    .grid {
        display: grid;
        grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
        gap: 18px;
    }
    .card { display: flex; background: #1d2335; border-radius: 10px; overflow: hidden; }
    .card.hidden { display: none; }
    .thumbnail { width: 120px; height: 120px; object-fit: cover; cursor: zoom-in; flex-shrink: 0; }
    .thumbnail.missing {
        display: flex;
        align-items: center;
        justify-content: center;
        cursor: default;
        color: #5c6278;
        background: #111522;
        font-size: 0.85em;
    }
    .card[data-class="person"] .thumbnail { object-position: top; }
    .info { padding: 12px; flex: 1; min-width: 0; }
    .title { font-weight: bold; font-size: 1.1em; margin-bottom: 4px; }
    .confidence { color: #4ade80; margin-bottom: 10px; }
    .timestamps { display: flex; flex-direction: column; gap: 5px; }
    .ts {
        background: #2a3042;
        padding: 5px 10px;
        border-radius: 4px;
        cursor: pointer;
        font-family: monospace;
    }
    .ts:hover { background: #ff6b6b; }
    .ts-file { color: #8a8fa3; font-size: 0.85em; overflow-wrap: anywhere; }
    .empty { color: #8a8fa3; padding: 40px 0; text-align: center; }
    .toast {
        position: fixed;
        bottom: 20px;
        left: 50%;
        transform: translateX(-50%);
        background: #4ade80;
        color: #000;
        padding: 12px 24px;
        border-radius: 8px;
        opacity: 0;
        transition: opacity 0.3s;
        z-index: 1000;
    }
    .toast.show { opacity: 1; }
    .lightbox {
        display: none;
        position: fixed;
        inset: 0;
        background: rgba(0, 0, 0, 0.9);
        z-index: 2000;
        justify-content: center;
        align-items: center;
        flex-direction: column;
    }
    .lightbox.active { display: flex; }
    .lightbox img { max-width: 90%; max-height: 80%; border-radius: 8px; }
    .lightbox-title { color: #fff; margin-top: 14px; font-size: 1.2em; }
    footer { color: #5c6278; margin-top: 30px; font-size: 0.85em; }
"#;

pub const SCRIPT: &str = r#"
    function copyTimestamp(el) {
        navigator.clipboard.writeText(el.dataset.ts).then(() => {
            const toast = document.getElementById('toast');
            toast.classList.add('show');
            setTimeout(() => toast.classList.remove('show'), 2000);
        });
    }

    function openLightbox(img) {
        document.getElementById('lightbox-img').src = img.src;
        document.getElementById('lightbox-title').textContent = img.alt;
        document.getElementById('lightbox').classList.add('active');
    }

    function closeLightbox() {
        document.getElementById('lightbox').classList.remove('active');
    }

    document.addEventListener('keydown', (e) => {
        if (e.key === 'Escape') closeLightbox();
    });

    function filterClass(btn) {
        const cls = btn.dataset.filter;
        document.querySelectorAll('.filter').forEach(b => b.classList.toggle('active', b === btn));
        document.querySelectorAll('.card').forEach(card => {
            card.classList.toggle('hidden', cls !== '*' && card.dataset.class !== cls);
        });
    }
"#;

pub const HINT: &str = "<strong>How to use:</strong> Click a timestamp to copy it. \
In VLC press <strong>Ctrl+T</strong> (Windows/Linux) or <strong>Cmd+T</strong> (Mac) \
and paste it to jump to that moment.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("car"), "car");
        assert_eq!(
            escape_html(r#"<b>"x" & 'y'</b>"#),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }
}
