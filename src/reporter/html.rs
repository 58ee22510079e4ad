//! HTML reporter: a self-contained page for one review run
//!
//! The canonical report is embedded as JSON and rendered client-side with
//! vanilla JS (severity filter, search, per-file grouping).

use crate::analyzer::scoring::ScoreCalculator;
use crate::ReviewReport;
use serde::Serialize;

/// Keeps the embedded JSON from closing the surrounding script block
fn escape_json_for_script(s: &str) -> String {
    s.replace("</", "<\\/")
}

/// Extra data the page shows next to the report itself
#[derive(Serialize)]
struct PageData<'a> {
    report: &'a ReviewReport,
    grade_description: &'static str,
    recommendations: Vec<String>,
}

/// Reporter that generates a self-contained HTML page
pub struct HtmlReporter;

impl HtmlReporter {
    pub fn new() -> Self {
        Self
    }

    /// Generate the full HTML document
    pub fn report(&self, report: &ReviewReport) -> String {
        let recommendations = if report.score.overall < 90.0 {
            ScoreCalculator::recommendations(&report.score)
        } else {
            Vec::new()
        };
        let data = PageData {
            report,
            grade_description: ScoreCalculator::grade_description(report.score.grade),
            recommendations,
        };
        let data_json = serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string());

        let mut html = String::with_capacity(16_384);
        html.push_str(Self::template_head());
        html.push_str("<script>const DATA=");
        html.push_str(&escape_json_for_script(&data_json));
        html.push_str(";</script>\n");
        html.push_str(Self::template_body());
        html.push_str(Self::template_script());
        html.push_str("</body>\n</html>\n");
        html
    }

    // ─── HTML template pieces ────────────────────────────────────────────

    fn template_head() -> &'static str {
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>pyreview – Test Quality Report</title>
<style>
:root{--bg:#0d0d11;--surface:#16161b;--surface2:#1e1e24;--border:#2a2a32;--text:#e4e4e7;--muted:#71717a;--green:#22c55e;--yellow:#eab308;--orange:#f97316;--red:#ef4444;--blue:#3b82f6;--radius:8px}
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:var(--bg);color:var(--text);line-height:1.5}
header{padding:1.25rem 1.5rem;border-bottom:1px solid var(--border);display:flex;gap:1.5rem;align-items:baseline;flex-wrap:wrap}
header h1{font-size:1.125rem;font-weight:700}
header .meta{font-size:.8125rem;color:var(--muted)}
.stats{display:flex;border-bottom:1px solid var(--border);background:var(--surface)}
.stat{flex:1;padding:.875rem 1.25rem;border-right:1px solid var(--border);text-align:center}
.stat:last-child{border-right:none}
.stat .val{font-size:1.5rem;font-weight:700;display:block}
.stat .lbl{font-size:.75rem;color:var(--muted);text-transform:uppercase;letter-spacing:.5px}
.wrap{max-width:1100px;margin:0 auto;padding:1rem 1.5rem}
.verdict{padding:.75rem 1rem;border-radius:var(--radius);margin-bottom:1rem;font-weight:600}
.verdict.pass{background:rgba(34,197,94,.12);color:var(--green)}
.verdict.fail{background:rgba(239,68,68,.15);color:var(--red)}
.verdict ul{font-weight:400;margin:.25rem 0 0 1.25rem}
.cat-grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(180px,1fr));gap:.5rem;margin-bottom:1rem}
.cat-card{background:var(--surface);border:1px solid var(--border);border-radius:6px;padding:.5rem .75rem}
.cat-card.off{opacity:.45}
.cat-card .name{font-size:.6875rem;color:var(--muted);text-transform:uppercase;letter-spacing:.3px}
.cat-card .score{font-size:1.125rem;font-weight:700}
.cat-card .meta{font-size:.6875rem;color:var(--muted)}
.bar{height:4px;background:var(--border);border-radius:2px;margin-top:4px}
.bar span{display:block;height:100%;border-radius:2px}
.controls{display:flex;gap:.75rem;align-items:center;margin:1rem 0;flex-wrap:wrap}
.search{background:var(--surface);border:1px solid var(--border);border-radius:var(--radius);padding:.45rem .75rem;color:var(--text);font-size:.8125rem;width:240px;outline:none}
.pill-group{display:flex;gap:2px;background:var(--surface);border-radius:var(--radius);padding:2px;border:1px solid var(--border)}
.pill{padding:.3rem .7rem;font-size:.75rem;font-weight:600;border-radius:6px;cursor:pointer;border:none;background:transparent;color:var(--muted)}
.pill.active{background:var(--surface2);color:var(--text)}
.file{margin-bottom:.75rem;background:var(--surface);border:1px solid var(--border);border-radius:var(--radius)}
.file h3{font-size:.8125rem;padding:.5rem .75rem;border-bottom:1px solid var(--border);font-family:'SF Mono',Consolas,monospace}
.issue{font-size:.8125rem;padding:.4rem .75rem;border-bottom:1px solid var(--border);display:grid;grid-template-columns:auto auto 1fr auto;gap:.5rem}
.issue:last-child{border-bottom:none}
.sev{font-size:.6875rem;font-weight:700;padding:.1rem .375rem;border-radius:4px;text-transform:uppercase}
.sev-error{background:rgba(239,68,68,.15);color:var(--red)}
.sev-warning{background:rgba(234,179,8,.12);color:var(--yellow)}
.sev-info{background:rgba(59,130,246,.12);color:var(--blue)}
.line{color:var(--muted);font-variant-numeric:tabular-nums}
.rule{font-size:.6875rem;color:var(--muted);font-family:'SF Mono',Consolas,monospace}
.test{color:var(--muted)}
.suggestion{grid-column:3/5;font-size:.75rem;color:var(--muted);font-style:italic}
.recs{margin:1rem 0 0 1.25rem;color:var(--muted);font-size:.8125rem}
.empty{text-align:center;padding:2rem;color:var(--muted)}
.c-green{color:var(--green)}.c-yellow{color:var(--yellow)}.c-orange{color:var(--orange)}.c-red{color:var(--red)}
</style>
</head>
<body>
"##
    }

    fn template_body() -> &'static str {
        r##"<header>
  <h1>pyreview</h1>
  <span class="meta" id="meta"></span>
</header>
<div class="stats" id="stats"></div>
<div class="wrap">
  <div id="verdict"></div>
  <div class="cat-grid" id="categories"></div>
  <ul class="recs" id="recs"></ul>
  <div class="controls">
    <input type="search" class="search" id="search" placeholder="Filter by file, rule or test…" autocomplete="off">
    <div class="pill-group" id="severity-filter">
      <button class="pill active" data-sev="all">All</button>
      <button class="pill" data-sev="error">Errors</button>
      <button class="pill" data-sev="warning">Warnings</button>
      <button class="pill" data-sev="info">Info</button>
    </div>
  </div>
  <div id="issues"></div>
</div>
"##
    }

    fn template_script() -> &'static str {
        r##"<script>
(function(){
"use strict";
const R=DATA.report;
const $=s=>document.querySelector(s);
const esc=s=>{const d=document.createElement('div');d.textContent=s==null?'':String(s);return d.innerHTML};
const tone=s=>s>=80?'green':s>=60?'yellow':'red';
let severity='all';
let query='';

function renderHeader(){
  $('#meta').textContent=`Test Quality Report · ${R.generated_at}`;
  const s=R.summary;
  $('#stats').innerHTML=`
    <div class="stat"><span class="val c-${tone(R.score.overall)}">${R.score.overall.toFixed(2)} <small>${esc(R.score.grade)}</small></span><span class="lbl">Score</span></div>
    <div class="stat"><span class="val">${s.files_analyzed}</span><span class="lbl">Files</span></div>
    <div class="stat"><span class="val">${s.tests_analyzed}</span><span class="lbl">Tests</span></div>
    <div class="stat"><span class="val${s.errors>0?' c-red':''}">${s.errors}</span><span class="lbl">Errors</span></div>
    <div class="stat"><span class="val">${s.warnings}</span><span class="lbl">Warnings</span></div>
    <div class="stat"><span class="val">${s.info}</span><span class="lbl">Info</span></div>`;
  const v=R.verdict;
  $('#verdict').innerHTML=v.passed
    ?`<div class="verdict pass">Passed · ${esc(DATA.grade_description)}</div>`
    :`<div class="verdict fail">Failed<ul>${v.reasons.map(r=>`<li>${esc(r)}</li>`).join('')}</ul></div>`;
}

function renderCategories(){
  const cats=R.score.categories;
  $('#categories').innerHTML=Object.keys(cats).map(name=>{
    const c=cats[name];
    if(!c.enabled)return `<div class="cat-card off"><div class="name">${esc(name)}</div><div class="score">–</div><div class="meta">disabled</div></div>`;
    return `<div class="cat-card"><div class="name">${esc(name)}</div>
      <div class="score c-${tone(c.subtotal)}">${c.subtotal.toFixed(1)}</div>
      <div class="meta">weight ${(c.weight*100).toFixed(0)}% · ${c.issue_count} issue${c.issue_count===1?'':'s'}</div>
      <div class="bar"><span style="width:${c.subtotal}%;background:var(--${tone(c.subtotal)})"></span></div></div>`;
  }).join('');
  $('#recs').innerHTML=DATA.recommendations.map(r=>`<li>${esc(r)}</li>`).join('');
}

function matches(i){
  if(severity!=='all'&&i.severity!==severity)return false;
  if(!query)return true;
  return [i.file,i.rule,i.test,i.message].some(v=>v&&v.toLowerCase().includes(query));
}

function renderIssues(){
  const groups=new Map();
  R.issues.filter(matches).forEach(i=>{
    const key=i.file||'(run)';
    if(!groups.has(key))groups.set(key,[]);
    groups.get(key).push(i);
  });
  if(groups.size===0){$('#issues').innerHTML='<div class="empty">No issues</div>';return}
  let html='';
  groups.forEach((items,file)=>{
    html+=`<div class="file"><h3>${esc(file)} <span class="line">(${items.length})</span></h3>`;
    items.forEach(i=>{
      html+=`<div class="issue"><span class="sev sev-${esc(i.severity)}">${esc(i.severity)}</span>
        <span class="line">L${i.line}</span>
        <span>${esc(i.message)} <span class="rule">${esc(i.rule)}</span></span>
        <span class="test">${esc(i.test||'')}</span>
        ${i.suggestion?`<span class="suggestion">→ ${esc(i.suggestion)}</span>`:''}</div>`;
    });
    html+='</div>';
  });
  $('#issues').innerHTML=html;
}

document.querySelectorAll('#severity-filter .pill').forEach(btn=>{
  btn.addEventListener('click',()=>{
    document.querySelectorAll('#severity-filter .pill').forEach(b=>b.classList.remove('active'));
    btn.classList.add('active');
    severity=btn.dataset.sev;
    renderIssues();
  });
});
$('#search').addEventListener('input',e=>{query=e.target.value.trim().toLowerCase();renderIssues()});

renderHeader();
renderCategories();
renderIssues();
})();
</script>
"##
    }
}

impl Default for HtmlReporter {
    fn default() -> Self {
        Self::new()
    }
}
