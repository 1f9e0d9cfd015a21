//! SCORM runtime API stub injected into previewed HTML.
//!
//! Exposes `window.API` (SCORM 1.2) and `window.API_1484_11` (SCORM 2004)
//! backed by in-page maps. Every call dispatches a `scorm-api-call`
//! `CustomEvent` carrying `{ packageId, api, method, args, result }`.
//! Existing API objects on the page are left alone.

const PACKAGE_ID_PLACEHOLDER: &str = "__COURSEPACK_PACKAGE_ID__";

const SCRIPT_TEMPLATE: &str = r#"
(function () {
  const packageId = __COURSEPACK_PACKAGE_ID__;
  const state12 = new Map();
  const state2004 = new Map();
  const lastError12 = { code: "0", message: "No error" };
  const lastError2004 = { code: "0", message: "No error" };

  function emit(api, method, args, result) {
    try {
      window.dispatchEvent(
        new CustomEvent("scorm-api-call", {
          detail: { packageId, api, method, args, result }
        })
      );
    } catch (error) {
      console.warn("SCORM debug emit failed", error);
    }
  }

  function wrapAPI(methods, apiName, state, lastError) {
    const api = {};
    Object.keys(methods).forEach((methodName) => {
      api[methodName] = function (...args) {
        const result = methods[methodName].apply(
          null,
          [state, lastError, ...args]
        );
        emit(apiName, methodName, args, result);
        return result;
      };
    });
    return api;
  }

  function runtimeMethods() {
    return {
      Initialize(state, lastError) {
        lastError.code = "0";
        return "true";
      },
      Terminate() {
        return "true";
      },
      GetValue(state, lastError, key) {
        lastError.code = "0";
        return state.get(key) ?? "";
      },
      SetValue(state, lastError, key, value) {
        state.set(key, value);
        lastError.code = "0";
        return "true";
      },
      Commit() {
        return "true";
      },
      GetLastError(state, lastError) {
        return lastError.code;
      },
      GetErrorString(state, lastError, code) {
        return code === "0" ? "No error" : "General error";
      },
      GetDiagnostic() {
        return "";
      }
    };
  }

  const api12 = wrapAPI(runtimeMethods(), "SCORM12", state12, lastError12);
  const api2004 = wrapAPI(runtimeMethods(), "SCORM2004", state2004, lastError2004);

  if (!window.API) {
    window.API = api12;
  }
  if (!window.API_1484_11) {
    window.API_1484_11 = api2004;
  }
})();"#;

/// Builds the runtime stub for one package.
///
/// The id is embedded as a JSON string literal, so quotes and `</script>`
/// sequences in it cannot break out of the script.
pub fn build_scorm_api_script(package_id: &str) -> String {
    let literal = serde_json::to_string(package_id)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/");
    SCRIPT_TEMPLATE.replace(PACKAGE_ID_PLACEHOLDER, &literal)
}

/// Inserts `script` before the first `</head>`, or prepends it when the
/// document has no head.
pub fn inject_shim(html: &str, script: &str) -> String {
    let tag = format!("<script>{}</script>", script);
    match html.find("</head>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..at]);
            out.push_str(&tag);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{}{}", tag, html),
    }
}
