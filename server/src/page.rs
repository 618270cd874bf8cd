/// Bare control page. Styling and layout are left to whatever UI fronts the API.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Color Lock</title>
</head>
<body>
<button onclick="startFeed()">Start</button>
<button onclick="stopFeed()">Stop</button>
<button onclick="saveColor()">Save</button>
<div><img id="video" src="" width="640" height="480"></div>
<div id="swatch" style="width:100px;height:100px;border:1px solid #000"></div>
<div id="hex">HEX: #------</div>
<div id="rgb">RGB: (---,---,---)</div>
<ul id="history"></ul>
<script>
let polling = null;
function startFeed() {
    fetch("/start_camera").then(res => {
        if (!res.ok) { return; }
        document.getElementById("video").src = "/video_feed";
        if (!polling) { polling = setInterval(pollColor, 500); }
    });
}
function stopFeed() {
    fetch("/stop_camera");
    document.getElementById("video").src = "";
}
function saveColor() {
    fetch("/save_color").then(() => loadHistory());
}
function pollColor() {
    fetch("/color_data").then(res => res.json()).then(c => {
        document.getElementById("swatch").style.background = c.hex;
        document.getElementById("hex").innerText = "HEX: " + c.hex;
        document.getElementById("rgb").innerText = "RGB: " + c.rgb;
    });
}
function loadHistory() {
    fetch("/get_history").then(res => res.json()).then(history => {
        const list = document.getElementById("history");
        list.innerHTML = "";
        history.forEach(c => {
            const item = document.createElement("li");
            item.textContent = c.hex + " / " + c.rgb;
            list.appendChild(item);
        });
    });
}
</script>
</body>
</html>
"#;
