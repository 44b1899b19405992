//! JavaScript evaluation scripts
//!
//! Everything the extractor needs from the live DOM is gathered by one
//! script in one pass; the result is plain JSON matching `RawDocument`.

/// Single-pass DOM walk returning a `RawDocument`
pub const DOM_WALK_SCRIPT: &str = r#"
    (() => {
        const text = (el) => (el.textContent || '').replace(/\s+/g, ' ').trim();
        const intAttr = (el, name) => {
            const raw = el.getAttribute(name);
            const parsed = raw === null ? NaN : parseInt(raw, 10);
            return Number.isFinite(parsed) && parsed >= 0 ? parsed : null;
        };

        const meta = [];
        document.querySelectorAll('meta').forEach(tag => {
            const key = tag.getAttribute('name')
                || tag.getAttribute('property')
                || tag.getAttribute('http-equiv');
            const content = tag.getAttribute('content');
            if (key && content !== null) {
                meta.push({ key: key, content: content });
            }
        });

        const headings = Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6'))
            .map(h => ({
                level: parseInt(h.tagName.substring(1), 10),
                text: text(h),
                id: h.id || null
            }));

        const images = Array.from(document.images).map(img => ({
            src: img.currentSrc || img.src || img.getAttribute('data-src') || '',
            alt: img.hasAttribute('alt') ? img.getAttribute('alt') : null,
            width: img.naturalWidth || intAttr(img, 'width'),
            height: img.naturalHeight || intAttr(img, 'height')
        }));

        const links = Array.from(document.querySelectorAll('a[href]')).map(a => ({
            href: a.getAttribute('href'),
            text: text(a),
            rel: a.getAttribute('rel')
        }));

        const jsonLd = Array.from(
            document.querySelectorAll('script[type="application/ld+json"]')
        ).map(s => s.textContent || '');

        const canonical = document.querySelector('link[rel="canonical"]');
        const favicon = document.querySelector(
            'link[rel="icon"], link[rel="shortcut icon"], link[rel="apple-touch-icon"]'
        );

        return {
            title: document.title || '',
            lang: document.documentElement.getAttribute('lang'),
            meta: meta,
            canonical: canonical ? canonical.href : null,
            hasFavicon: favicon !== null,
            headings: headings,
            images: images,
            links: links,
            jsonLd: jsonLd,
            textContent: document.body ? (document.body.innerText || '') : '',
            finalUrl: location.href
        };
    })()
"#;

/// Document readiness probe used while waiting for the page to settle
pub const READY_STATE_SCRIPT: &str = r#"
    (() => ({
        readyState: document.readyState,
        bodyExists: document.body !== null
    }))()
"#;

/// Build a script that reports whether `selector` matches anything
///
/// The selector is embedded as a JSON string literal so quotes cannot
/// break out of the expression.
pub fn selector_probe_script(selector: &str) -> String {
    let literal = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{ try {{ return document.querySelector({literal}) !== null; }} \
         catch (e) {{ return false; }} }})()"
    )
}
