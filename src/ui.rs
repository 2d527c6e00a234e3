use crate::models::{format_date, Record, Window};

pub fn render_index(records: &[Record]) -> String {
    let latest = records
        .iter()
        .max_by_key(|record| record.date)
        .map(|record| record.blood_sugar.to_string())
        .unwrap_or_else(|| "--".to_string());

    INDEX_HTML
        .replace("{{COUNT}}", &records.len().to_string())
        .replace("{{LATEST}}", &latest)
        .replace("{{ROWS}}", &render_rows(records))
        .replace("{{WINDOW_BUTTONS}}", &render_window_buttons())
}

fn render_rows(records: &[Record]) -> String {
    records
        .iter()
        .map(|record| {
            let date = format_date(&record.date);
            format!(
                r#"<li class="record" data-date="{date}"><span class="level">{level} mg/dL</span><time datetime="{date}">{date}</time></li>"#,
                level = record.blood_sugar,
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ")
}

fn render_window_buttons() -> String {
    Window::ALL
        .iter()
        .map(|window| {
            format!(
                r#"<button class="tab" type="button" data-window="{}" data-label="{}">{}</button>"#,
                window.as_str(),
                window.label(),
                window.label(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n          ")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Blood Sugar Log</title>
  <style>
    :root {
      --bg-1: #eef5f3;
      --bg-2: #cfe8e1;
      --ink: #22302d;
      --accent: #2a9d8f;
      --accent-2: #264653;
      --danger: #c63b2b;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(38, 70, 83, 0.16);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #f4fbf9 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(760px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 24px;
    }

    h1 {
      font-family: "Georgia", serif;
      margin: 0;
      font-size: clamp(1.8rem, 4vw, 2.4rem);
    }

    .subtitle {
      margin: 6px 0 0;
      color: #5d6b68;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 18px;
      padding: 16px;
      border: 1px solid rgba(38, 70, 83, 0.08);
      display: grid;
      gap: 6px;
    }

    .stat .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #7c8a87;
    }

    .stat .value {
      font-size: 1.6rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    form.entry {
      display: flex;
      flex-wrap: wrap;
      gap: 12px;
    }

    input {
      flex: 1 1 220px;
      border: 1px solid rgba(38, 70, 83, 0.2);
      border-radius: 14px;
      padding: 14px 16px;
      font-size: 1rem;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 12px 18px;
      font-size: 0.95rem;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    button.primary {
      background: var(--accent);
    }

    button.small {
      padding: 6px 12px;
      font-size: 0.8rem;
    }

    button.danger {
      background: var(--danger);
    }

    .toolbar {
      display: flex;
      flex-wrap: wrap;
      align-items: center;
      justify-content: space-between;
      gap: 12px;
    }

    .tabs {
      display: flex;
      flex-wrap: wrap;
      gap: 6px;
      padding: 6px;
      background: rgba(38, 70, 83, 0.08);
      border-radius: 999px;
    }

    .tab {
      background: transparent;
      color: #55625f;
    }

    .tab:hover {
      background: white;
      color: var(--accent-2);
    }

    ul.history {
      list-style: none;
      margin: 0;
      padding: 0;
      display: grid;
      gap: 8px;
    }

    .record {
      display: flex;
      flex-wrap: wrap;
      align-items: center;
      gap: 12px;
      background: white;
      border-radius: 14px;
      padding: 10px 14px;
      border: 1px solid rgba(38, 70, 83, 0.08);
    }

    .record .level {
      font-weight: 600;
      min-width: 110px;
    }

    .record time {
      flex: 1;
      color: #6b7774;
      font-size: 0.9rem;
    }

    .chart-card {
      background: white;
      border-radius: 20px;
      padding: 16px;
      border: 1px solid rgba(38, 70, 83, 0.08);
    }

    #chart {
      width: 100%;
      height: 220px;
      display: block;
    }

    .chart-line {
      fill: none;
      stroke: var(--accent);
      stroke-width: 0.8;
    }

    .chart-point {
      fill: white;
      stroke: var(--accent);
      stroke-width: 0.6;
    }

    .chart-label {
      fill: #6b7774;
      font-size: 3px;
    }

    .hidden {
      display: none;
    }

    .status {
      min-height: 1.2em;
      color: #5d6b68;
    }

    .status[data-type="error"] {
      color: var(--danger);
    }

    .status[data-type="ok"] {
      color: #2d7a4b;
    }

    .hint {
      margin: 0;
      color: #6f7a77;
      font-size: 0.85rem;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Blood Sugar Log</h1>
      <p class="subtitle">Log and track your blood sugar levels.</p>
    </header>

    <section class="panel">
      <div class="stat">
        <span class="label">Readings</span>
        <span id="count" class="value">{{COUNT}}</span>
      </div>
      <div class="stat">
        <span class="label">Latest (mg/dL)</span>
        <span id="latest" class="value">{{LATEST}}</span>
      </div>
      <div class="stat">
        <span class="label">Estimated A1c</span>
        <span id="a1c" class="value">--</span>
      </div>
    </section>

    <form id="entry-form" class="entry" method="post" action="/records/add">
      <input id="level" name="bloodSugar" inputmode="decimal" placeholder="Enter your blood sugar level" />
      <input id="edit-date" class="hidden" type="datetime-local" />
      <button class="primary" id="submit-btn" type="submit">Add Record</button>
      <button class="hidden" id="cancel-btn" type="button">Cancel</button>
    </form>

    <section class="toolbar">
      <div class="tabs" role="group" aria-label="Calculate A1c">
          {{WINDOW_BUTTONS}}
      </div>
      <div class="tabs">
        <button class="tab" type="button" id="sort-btn" data-order="desc">Newest first</button>
        <button class="tab" type="button" id="view-btn">Show Graph</button>
      </div>
    </section>

    <section id="list-view">
      <ul id="history" class="history">
        {{ROWS}}
      </ul>
    </section>

    <section id="chart-view" class="chart-card hidden">
      <svg id="chart" viewBox="0 0 100 100" preserveAspectRatio="none" aria-label="Blood sugar chart" role="img"></svg>
    </section>

    <div class="status" id="status"></div>
    <p class="hint">A1c is estimated as (average + 46.7) / 28.7 over readings in the chosen window. Weekly uses a quarter month.</p>
  </main>

  <script>
    const statusEl = document.getElementById('status');
    const countEl = document.getElementById('count');
    const latestEl = document.getElementById('latest');
    const a1cEl = document.getElementById('a1c');
    const levelEl = document.getElementById('level');
    const editDateEl = document.getElementById('edit-date');
    const submitBtn = document.getElementById('submit-btn');
    const cancelBtn = document.getElementById('cancel-btn');
    const historyEl = document.getElementById('history');
    const chartEl = document.getElementById('chart');
    const listView = document.getElementById('list-view');
    const chartView = document.getElementById('chart-view');
    const sortBtn = document.getElementById('sort-btn');
    const viewBtn = document.getElementById('view-btn');

    let order = 'desc';
    let view = 'list';
    let editing = null;

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const request = async (url, options) => {
      const res = await fetch(url, options);
      if (!res.ok) {
        const msg = await res.text();
        throw new Error(msg || 'Request failed');
      }
      return res.status === 204 ? null : res.json();
    };

    const toLocalInput = (iso) => {
      const date = new Date(iso);
      const offset = date.getTimezoneOffset() * 60000;
      return new Date(date.getTime() - offset).toISOString().slice(0, 16);
    };

    const resetForm = () => {
      editing = null;
      levelEl.value = '';
      editDateEl.classList.add('hidden');
      cancelBtn.classList.add('hidden');
      submitBtn.textContent = 'Add Record';
    };

    const startEdit = (record) => {
      editing = record;
      levelEl.value = record.bloodSugar;
      editDateEl.value = toLocalInput(record.date);
      editDateEl.classList.remove('hidden');
      cancelBtn.classList.remove('hidden');
      submitBtn.textContent = 'Save Record';
      levelEl.focus();
    };

    const renderList = (records) => {
      historyEl.innerHTML = '';
      records.forEach((record) => {
        const item = document.createElement('li');
        item.className = 'record';
        const level = document.createElement('span');
        level.className = 'level';
        level.textContent = `${record.bloodSugar} mg/dL`;
        const time = document.createElement('time');
        time.dateTime = record.date;
        time.textContent = new Date(record.date).toLocaleString();
        const edit = document.createElement('button');
        edit.className = 'small';
        edit.type = 'button';
        edit.textContent = 'Edit';
        edit.addEventListener('click', () => startEdit(record));
        const remove = document.createElement('button');
        remove.className = 'small danger';
        remove.type = 'button';
        remove.textContent = 'Delete';
        remove.addEventListener('click', () => deleteRecord(record).catch((err) => setStatus(err.message, 'error')));
        item.append(level, time, edit, remove);
        historyEl.appendChild(item);
      });
      countEl.textContent = records.length;
      const newest = records.reduce((acc, r) => (!acc || r.date > acc.date ? r : acc), null);
      latestEl.textContent = newest ? newest.bloodSugar : '--';
    };

    const renderChart = (chart) => {
      if (!chart.points.length) {
        chartEl.innerHTML = '<text class="chart-label" x="50" y="50" text-anchor="middle">No data yet</text>';
        return;
      }
      const line = chart.points.map((p) => `${p.x.toFixed(2)},${p.y.toFixed(2)}`).join(' ');
      const dots = chart.points
        .map((p) => `<circle class="chart-point" cx="${p.x}" cy="${p.y}" r="1.2" /><text class="chart-label" x="${p.x}" y="${Math.max(p.y - 3, 3)}">${p.label}</text>`)
        .join('');
      chartEl.innerHTML = `<polyline class="chart-line" points="${line}" />${dots}`;
    };

    const refresh = async () => {
      const data = await request(`/api/records?order=${order}`);
      renderList(data.records);
      if (view === 'chart') {
        renderChart(await request('/api/chart'));
      }
    };

    const deleteRecord = async (record) => {
      await request(`/api/records/${encodeURIComponent(record.date)}`, { method: 'DELETE' });
      setStatus('Record deleted', 'ok');
      await refresh();
    };

    const submit = async () => {
      const bloodSugar = levelEl.value.trim();
      if (!bloodSugar) {
        setStatus('Please enter a blood sugar level.', 'error');
        return;
      }
      const headers = { 'content-type': 'application/json' };
      if (editing) {
        const date = editDateEl.value ? new Date(editDateEl.value).toISOString() : editing.date;
        await request(`/api/records/${encodeURIComponent(editing.date)}`, {
          method: 'PUT',
          headers,
          body: JSON.stringify({ bloodSugar, date })
        });
        setStatus('Record updated', 'ok');
      } else {
        await request('/api/records', { method: 'POST', headers, body: JSON.stringify({ bloodSugar }) });
        setStatus('Your blood sugar level has been logged.', 'ok');
      }
      resetForm();
      await refresh();
    };

    const showA1c = async (button) => {
      const result = await request(`/api/a1c?window=${button.dataset.window}`);
      if (result.status === 'insufficient_data') {
        a1cEl.textContent = '--';
        setStatus(`Not enough readings for the ${button.dataset.label}.`, 'error');
        return;
      }
      a1cEl.textContent = `${result.display}%`;
      setStatus(`A1c for ${button.dataset.label}: ${result.display} (${result.records} readings)`, 'ok');
    };

    document.getElementById('entry-form').addEventListener('submit', (event) => {
      event.preventDefault();
      submit().catch((err) => setStatus(err.message, 'error'));
    });

    cancelBtn.addEventListener('click', resetForm);

    document.querySelectorAll('[data-window]').forEach((button) => {
      button.addEventListener('click', () => showA1c(button).catch((err) => setStatus(err.message, 'error')));
    });

    sortBtn.addEventListener('click', () => {
      order = order === 'desc' ? 'asc' : 'desc';
      sortBtn.textContent = order === 'desc' ? 'Newest first' : 'Oldest first';
      refresh().catch((err) => setStatus(err.message, 'error'));
    });

    viewBtn.addEventListener('click', () => {
      view = view === 'list' ? 'chart' : 'list';
      listView.classList.toggle('hidden', view !== 'list');
      chartView.classList.toggle('hidden', view !== 'chart');
      viewBtn.textContent = view === 'list' ? 'Show Graph' : 'Show List';
      refresh().catch((err) => setStatus(err.message, 'error'));
    });

    refresh().catch((err) => setStatus(err.message, 'error'));
  </script>
</body>
</html>
"#;
