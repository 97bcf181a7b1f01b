//! Client-side runtime patch injected into HTML.
//!
//! Static rewriting cannot see URLs built by scripts at runtime. The patch
//! wraps `fetch` and `XMLHttpRequest.open` so calls to the target origin or
//! to root-relative paths go through the proxy, and observes DOM insertions
//! to fix `src`, `href`, `data-src`, `data-href` and inline `url(...)`
//! styles on nodes added after load. URLs already under the proxy mount are
//! left as they are.

use crate::rewrite::context::RewriteContext;

const TEMPLATE: &str = r#"<script data-rewrite-proxy>
(function () {
  var base = __PROXY_BASE__;
  var mount = __PROXY_MOUNT__;
  var targetOrigin = __TARGET_ORIGIN__;
  var targetHost = targetOrigin.replace(/^https?:/, '');

  function proxied(url) {
    if (typeof url !== 'string' || url === '') return url;
    if (url.indexOf(base) === 0 || url.indexOf(mount + '/') === 0) return url;
    if (url === targetOrigin || url.indexOf(targetOrigin + '/') === 0) {
      return base + (url.slice(targetOrigin.length) || '/');
    }
    if (url.indexOf(targetHost + '/') === 0) return base + url.slice(targetHost.length);
    if (url.charAt(0) === '/' && url.charAt(1) !== '/') return base + url;
    return url;
  }

  if (window.fetch) {
    var originalFetch = window.fetch;
    window.fetch = function (resource, init) {
      if (typeof resource === 'string') {
        resource = proxied(resource);
      } else if (typeof URL !== 'undefined' && resource instanceof URL) {
        resource = proxied(resource.href);
      }
      return originalFetch.call(this, resource, init);
    };
  }

  if (window.XMLHttpRequest) {
    var originalOpen = XMLHttpRequest.prototype.open;
    XMLHttpRequest.prototype.open = function (method, url) {
      var args = Array.prototype.slice.call(arguments);
      args[1] = proxied(String(url));
      return originalOpen.apply(this, args);
    };
  }

  var attrs = ['src', 'href', 'data-src', 'data-href'];
  function patchElement(el) {
    if (!el.getAttribute) return;
    attrs.forEach(function (attr) {
      var value = el.getAttribute(attr);
      if (value) {
        var next = proxied(value);
        if (next !== value) el.setAttribute(attr, next);
      }
    });
    var style = el.getAttribute('style');
    if (style && style.indexOf('url(') !== -1) {
      var patched = style.replace(/url\((['"]?)([^)'"]+)\1\)/gi, function (m, q, u) {
        return 'url(' + q + proxied(u) + q + ')';
      });
      if (patched !== style) el.setAttribute('style', patched);
    }
  }

  var observer = new MutationObserver(function (mutations) {
    mutations.forEach(function (mutation) {
      mutation.addedNodes.forEach(function (node) {
        if (node.nodeType !== 1) return;
        patchElement(node);
        node.querySelectorAll('[src], [href], [data-src], [data-href], [style*="url("]')
          .forEach(patchElement);
      });
    });
  });

  function start() {
    observer.observe(document.documentElement, { childList: true, subtree: true });
  }
  if (document.documentElement) {
    start();
  } else {
    document.addEventListener('DOMContentLoaded', start);
  }
})();
</script>
"#;

/// JSON string literal safe to embed inside a `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}

/// Render the patch for one response.
pub fn render(ctx: &RewriteContext<'_>) -> String {
    TEMPLATE
        .replace("__PROXY_BASE__", &js_string(&ctx.base()))
        .replace("__PROXY_MOUNT__", &js_string(ctx.mount))
        .replace(
            "__TARGET_ORIGIN__",
            &js_string(&ctx.target.origin().ascii_serialization()),
        )
}

/// Insert the patch before the last `</body>`, or append it.
pub fn inject(mut html: String, ctx: &RewriteContext<'_>) -> String {
    let patch = render(ctx);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => html.insert_str(pos, &patch),
        None => html.push_str(&patch),
    }
    html
}
