pub fn build_main_ui_html() -> String {
    MAIN_UI_HTML.to_string()
}

const MAIN_UI_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>VisionPrompt</title>
  <style>
    :root {
      --bg: #f8fafc;
      --panel: #ffffff;
      --line: #e2e8f0;
      --text: #0f172a;
      --muted: #64748b;
      --accent: #4f46e5;
      --accent-soft: #eef2ff;
      --danger: #dc2626;
      --danger-soft: #fef2f2;
      --radius: 18px;
    }
    * { box-sizing: border-box; }
    body {
      margin: 0;
      color: var(--text);
      background: var(--bg);
      font-family: "Segoe UI", "Inter", system-ui, sans-serif;
      font-size: 15px;
    }
    header {
      position: sticky;
      top: 0;
      z-index: 5;
      display: flex;
      align-items: center;
      gap: 10px;
      padding: 14px 28px;
      background: rgba(255, 255, 255, 0.85);
      border-bottom: 1px solid var(--line);
      backdrop-filter: blur(8px);
    }
    header .logo {
      width: 32px;
      height: 32px;
      border-radius: 9px;
      background: var(--accent);
      color: #fff;
      display: grid;
      place-items: center;
      font-weight: 700;
    }
    header h1 { margin: 0; font-size: 20px; }
    header h1 span { color: var(--accent); }
    main { max-width: 1100px; margin: 0 auto; padding: 32px 24px 64px; }
    .hero { text-align: center; margin-bottom: 28px; }
    .hero h2 { font-size: 32px; margin: 0 0 8px; }
    .hero p { color: var(--muted); margin: 0; }
    .muted { color: var(--muted); }
    .upload-zone {
      border: 2px dashed var(--line);
      border-radius: 28px;
      padding: 56px 24px;
      text-align: center;
      background: var(--panel);
      cursor: pointer;
      transition: border-color 0.15s, background 0.15s;
    }
    .upload-zone.dragging { border-color: var(--accent); background: var(--accent-soft); }
    .upload-zone.hidden { display: none; }
    .upload-zone .hint { font-size: 12px; color: var(--muted); margin-top: 10px; }
    .preview-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 28px; align-items: start; }
    @media (max-width: 860px) { .preview-grid { grid-template-columns: 1fr; } }
    .preview-frame {
      position: relative;
      border-radius: 24px;
      overflow: hidden;
      background: #fff;
      border: 1px solid var(--line);
    }
    .preview-image { display: block; width: 100%; max-height: 520px; object-fit: contain; }
    .image-badge {
      position: absolute;
      top: 12px;
      left: 12px;
      padding: 3px 10px;
      border-radius: 999px;
      background: rgba(15, 23, 42, 0.7);
      color: #fff;
      font-size: 11px;
      max-width: 80%;
      overflow: hidden;
      text-overflow: ellipsis;
      white-space: nowrap;
    }
    .card {
      background: var(--panel);
      border: 1px solid var(--line);
      border-radius: 24px;
      padding: 26px;
    }
    .card h3 { margin: 0 0 6px; }
    .card-title { display: flex; justify-content: space-between; align-items: center; margin-bottom: 12px; }
    .card.generating { text-align: center; padding: 56px 26px; }
    .spinner {
      width: 56px;
      height: 56px;
      margin: 0 auto 18px;
      border: 4px solid var(--accent-soft);
      border-top-color: var(--accent);
      border-radius: 50%;
      animation: spin 0.9s linear infinite;
    }
    @keyframes spin { to { transform: rotate(360deg); } }
    .prompt-text {
      margin: 0 0 18px;
      padding: 16px;
      border-radius: 14px;
      background: var(--bg);
      border: 1px solid var(--line);
      font-family: "Cascadia Mono", ui-monospace, monospace;
      font-size: 13px;
      line-height: 1.6;
      white-space: pre-wrap;
    }
    .stack { display: grid; grid-template-columns: 1fr 1fr; gap: 10px; }
    button { font: inherit; cursor: pointer; }
    .primary-btn, .outline-btn, .dark-btn {
      width: 100%;
      padding: 13px 16px;
      border-radius: 14px;
      font-weight: 700;
    }
    .primary-btn { background: var(--accent); color: #fff; border: none; margin-top: 14px; }
    .outline-btn { background: #fff; color: var(--text); border: 2px solid var(--line); }
    .dark-btn { background: var(--text); color: #fff; border: none; }
    .icon-btn {
      border: 1px solid var(--line);
      background: #fff;
      border-radius: 10px;
      padding: 5px 10px;
      font-size: 12px;
    }
    .link-btn { border: none; background: none; color: var(--muted); font-size: 13px; padding: 8px 0; }
    .link-btn.danger:hover { color: var(--danger); }
    .error-box {
      margin-top: 16px;
      padding: 14px 16px;
      border-radius: 14px;
      background: var(--danger-soft);
      border: 1px solid #fecaca;
      color: var(--danger);
    }
    .error-title { font-weight: 700; margin: 0 0 4px; }
    .error-message { margin: 0; font-size: 13px; }
    .status { min-height: 20px; margin: 12px 0; color: var(--danger); font-size: 13px; text-align: center; }
    .history { margin-top: 56px; }
    .history-head { display: flex; justify-content: space-between; align-items: end; margin-bottom: 18px; }
    .history-head h2 { margin: 0; font-size: 22px; }
    .history-head p { margin: 4px 0 0; font-size: 13px; }
    .history-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 18px; }
    .history-card { background: var(--panel); border: 1px solid var(--line); border-radius: 18px; overflow: hidden; }
    .history-card .thumb { aspect-ratio: 16 / 9; background: var(--bg); }
    .history-card .thumb img { width: 100%; height: 100%; object-fit: cover; display: block; }
    .card-body { padding: 12px 14px; }
    .card-meta { display: flex; justify-content: space-between; align-items: center; margin-bottom: 6px; }
    .card-date { font-size: 11px; color: var(--muted); }
    .card-prompt {
      margin: 0;
      font-size: 12px;
      display: -webkit-box;
      -webkit-line-clamp: 3;
      -webkit-box-orient: vertical;
      overflow: hidden;
    }
  </style>
</head>
<body>
  <header>
    <div class="logo">V</div>
    <h1>Vision<span>Prompt</span></h1>
  </header>
  <main>
    <section class="hero">
      <h2>Image to Prompt</h2>
      <p>Upload an image and get a detailed prompt you can feed to any image generator.</p>
    </section>

    <label id="uploadZone" class="upload-zone">
      <input id="fileInput" type="file" accept="image/*" hidden />
      <strong>Drop your image here</strong>
      <div class="muted">or click to browse</div>
      <div class="hint">PNG, JPG, WEBP or GIF up to 20MB</div>
    </label>

    <div id="status" class="status" role="status"></div>
    <div id="panel"></div>
    <section id="history" class="history"></section>
  </main>

  <script>
    const state = {
      phase: "idle",
      revision: 0,
      confirm_clear: true,
    };
    let pollTimer = null;

    function setStatus(message) {
      document.getElementById("status").textContent = message || "";
    }

    async function apiGet(path) {
      const res = await fetch(path, { method: "GET" });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    async function apiPost(path, body) {
      const res = await fetch(path, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body || {}),
      });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    function applySnapshot(payload) {
      state.phase = payload.phase || "idle";
      state.revision = payload.revision || 0;
      if (typeof payload.confirm_clear === "boolean") {
        state.confirm_clear = payload.confirm_clear;
      }
      document.getElementById("panel").innerHTML = payload.panel_html || "";
      document.getElementById("history").innerHTML = payload.history_html || "";
      document
        .getElementById("uploadZone")
        .classList.toggle("hidden", state.phase !== "idle");
      schedulePoll();
    }

    function schedulePoll() {
      if (pollTimer) {
        clearTimeout(pollTimer);
        pollTimer = null;
      }
      if (state.phase !== "generating") {
        return;
      }
      pollTimer = setTimeout(async () => {
        pollTimer = null;
        try {
          const data = await apiGet("/app/revision");
          if (data.revision !== state.revision) {
            applySnapshot(await apiGet("/app/init"));
          } else {
            schedulePoll();
          }
        } catch (err) {
          setStatus(`Connection lost: ${err.message}`);
        }
      }, 250);
    }

    async function init() {
      try {
        applySnapshot(await apiGet("/app/init"));
      } catch (err) {
        setStatus(`Startup error: ${err.message}`);
      }
    }

    async function selectFile(file) {
      if (!file) {
        return;
      }
      if (!file.type.startsWith("image/")) {
        alert("Please upload an image file.");
        return;
      }
      const form = new FormData();
      form.append("file", file, file.name);
      try {
        const res = await fetch("/app/select", { method: "POST", body: form });
        const data = await res.json();
        if (!res.ok || !data.ok) {
          throw new Error(data.error || "upload failed");
        }
        applySnapshot(data);
        setStatus("");
      } catch (err) {
        setStatus(`Upload failed: ${err.message}`);
      }
    }

    async function copyPrompt(prompt) {
      if (!prompt || !prompt.trim()) {
        return;
      }
      try {
        if (navigator.clipboard && navigator.clipboard.writeText) {
          await navigator.clipboard.writeText(prompt).catch(() => {});
        }
        await apiPost("/app/copy", { prompt });
        alert("Prompt copied to clipboard!");
      } catch (err) {
        setStatus(`Copy failed: ${err.message}`);
      }
    }

    const actions = {
      async generate() {
        applySnapshot(await apiPost("/app/generate", {}));
      },
      async reset() {
        applySnapshot(await apiPost("/app/reset", {}));
        document.getElementById("fileInput").value = "";
      },
      async "clear-history"() {
        let confirmed = true;
        if (state.confirm_clear) {
          confirmed = confirm("Are you sure you want to clear your generation history?");
        }
        if (!confirmed) {
          return;
        }
        applySnapshot(await apiPost("/app/history/clear", { confirmed }));
      },
      async copy(target) {
        await copyPrompt(target.dataset.prompt || "");
      },
    };

    document.addEventListener("click", async (event) => {
      const target = event.target.closest("[data-action]");
      if (!target) {
        return;
      }
      const handler = actions[target.dataset.action];
      if (!handler) {
        return;
      }
      event.preventDefault();
      try {
        await handler(target);
        if (target.dataset.action !== "copy") {
          setStatus("");
        }
      } catch (err) {
        setStatus(err.message);
      }
    });

    const zone = document.getElementById("uploadZone");
    document.getElementById("fileInput").addEventListener("change", (event) => {
      selectFile(event.target.files && event.target.files[0]);
    });
    zone.addEventListener("dragover", (event) => {
      event.preventDefault();
      zone.classList.add("dragging");
    });
    zone.addEventListener("dragleave", () => zone.classList.remove("dragging"));
    zone.addEventListener("drop", (event) => {
      event.preventDefault();
      zone.classList.remove("dragging");
      selectFile(event.dataTransfer.files && event.dataTransfer.files[0]);
    });

    init();
  </script>
</body>
</html>
"#;
