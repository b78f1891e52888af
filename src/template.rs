//! Starter game handed to the model when a session has no code yet.
//!
//! The script runs inside the live canvas sandbox, so it draws on the
//! injected `canvas` and loops through the injected `requestAnimationFrame`.
//! `assetUrls` is the hook the model rewrites with `PENDING_<name>` tokens.

pub const DEFAULT_GAME: &str = r##"
// Side-scrolling runner: jump over spikes, land on platforms
const ctx = canvas.getContext("2d");
canvas.width = 800;
canvas.height = 400;

// Image URLs for generated sprites (null -> coloured fallback shapes)
const assetUrls = {
  player: null,
  spike: null,
  platform: null,
  background: null
};

const sprites = {};

function loadImage(url, done) {
  const img = new Image();
  img.onload = () => done(img);
  img.onerror = () => done(null);
  img.src = url;
}

function loadAssets() {
  Object.keys(assetUrls).forEach((key) => {
    if (assetUrls[key]) {
      loadImage(assetUrls[key], (img) => { sprites[key] = img; });
    }
  });
}

const GROUND = 50;
const GRAVITY = 0.6;
const JUMP = -12;

const game = {
  player: { x: 100, y: 0, width: 30, height: 30, vy: 0, grounded: true, color: "#00ff00" },
  obstacles: [],
  speed: 5,
  score: 0,
  frame: 0,
  over: false
};

function floorY(height) {
  return canvas.height - GROUND - height;
}

function spawnObstacle() {
  const type = Math.random() < 0.5 ? "spike" : "platform";
  const size = 40;
  game.obstacles.push({
    type,
    x: canvas.width,
    y: type === "spike" ? floorY(size) : floorY(size) - 80 - Math.random() * 100,
    width: size,
    height: size,
    color: type === "spike" ? "#ff0000" : "#0000ff"
  });
}

function reset() {
  game.player.y = floorY(game.player.height);
  game.player.vy = 0;
  game.player.grounded = true;
  game.obstacles = [];
  game.speed = 5;
  game.score = 0;
  game.frame = 0;
  game.over = false;
  loadAssets();
  spawnObstacle();
}

function jump() {
  if (game.over) {
    reset();
  } else if (game.player.grounded) {
    game.player.vy = JUMP;
    game.player.grounded = false;
  }
}

canvas.addEventListener("click", jump);
document.addEventListener("keydown", (e) => {
  if (e.key === " " || e.key === "ArrowUp" || (e.key === "r" && game.over)) {
    jump();
  }
});

function overlaps(a, b) {
  return a.x < b.x + b.width && a.x + a.width > b.x &&
         a.y < b.y + b.height && a.y + a.height > b.y;
}

function update() {
  if (game.over) return;
  const p = game.player;
  game.frame++;

  p.vy += GRAVITY;
  p.y += p.vy;
  if (p.y >= floorY(p.height)) {
    p.y = floorY(p.height);
    p.vy = 0;
    p.grounded = true;
  }

  for (let i = game.obstacles.length - 1; i >= 0; i--) {
    const o = game.obstacles[i];
    o.x -= game.speed;
    if (o.x + o.width < 0) {
      game.obstacles.splice(i, 1);
      game.score++;
      continue;
    }
    if (!overlaps(p, o)) continue;
    if (o.type === "spike") {
      game.over = true;
    } else if (p.vy > 0 && p.y < o.y) {
      p.y = o.y - p.height;
      p.vy = 0;
      p.grounded = true;
    }
  }

  if (game.frame % 120 === 0) spawnObstacle();
  if (game.frame % 600 === 0 && game.speed < 10) game.speed += 0.5;
}

function drawSpike(o) {
  ctx.beginPath();
  ctx.moveTo(o.x + o.width / 2, o.y);
  ctx.lineTo(o.x, o.y + o.height);
  ctx.lineTo(o.x + o.width, o.y + o.height);
  ctx.closePath();
  ctx.fill();
}

function drawEntity(sprite, e, fallback) {
  if (sprite) {
    ctx.drawImage(sprite, e.x, e.y, e.width, e.height);
  } else {
    ctx.fillStyle = e.color;
    fallback(e);
  }
}

function draw() {
  if (sprites.background) {
    ctx.drawImage(sprites.background, 0, 0, canvas.width, canvas.height);
  } else {
    ctx.fillStyle = "#87CEEB";
    ctx.fillRect(0, 0, canvas.width, canvas.height);
  }

  ctx.fillStyle = "#333333";
  ctx.fillRect(0, canvas.height - GROUND, canvas.width, GROUND);

  const rect = (e) => ctx.fillRect(e.x, e.y, e.width, e.height);
  drawEntity(sprites.player, game.player, rect);
  for (const o of game.obstacles) {
    drawEntity(sprites[o.type], o, o.type === "spike" ? drawSpike : rect);
  }

  ctx.fillStyle = "#000000";
  ctx.font = "bold 24px Arial";
  ctx.textAlign = "left";
  ctx.fillText("Score: " + game.score, 20, 40);

  if (game.over) {
    ctx.fillStyle = "rgba(0, 0, 0, 0.5)";
    ctx.fillRect(0, 0, canvas.width, canvas.height);
    ctx.fillStyle = "#ffffff";
    ctx.textAlign = "center";
    ctx.font = "bold 48px Arial";
    ctx.fillText("Game Over!", canvas.width / 2, canvas.height / 2 - 30);
    ctx.font = "24px Arial";
    ctx.fillText("Final Score: " + game.score, canvas.width / 2, canvas.height / 2 + 20);
    ctx.fillText("Click or press R to restart", canvas.width / 2, canvas.height / 2 + 60);
  }
}

function loop() {
  update();
  draw();
  requestAnimationFrame(loop);
}

reset();
loop();
"##;
