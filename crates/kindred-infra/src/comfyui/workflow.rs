//! Default txt2img node graph and checkpoint selection.

use serde_json::{Value, json};

pub const DEFAULT_CHECKPOINT: &str = "v1-5-pruned-emaonly.ckpt";

/// Substrings marking video-only checkpoints, which txt2img cannot use.
const VIDEO_SKIP: &[&str] = &["ltxv", "ltx_v", "animate", "svd", "xtend", "i2vgen", "video"];

/// Substrings suggesting a photographic model. Each match scores a point.
const PHOTO_PREF: &[&str] = &["photo", "realistic", "love", "xl", "flux", "sdxl", "pony"];

/// Checkpoints in these families want a 1024px latent.
const XL_FAMILY: &[&str] = &["xl", "sdxl", "pony", "flux", "juggernaut"];

const CFG: f64 = 7.0;
const STEPS: u32 = 30;

/// Score a checkpoint name; `None` for video models.
fn score(name: &str) -> Option<usize> {
    let lower = name.to_lowercase();
    if VIDEO_SKIP.iter().any(|v| lower.contains(v)) {
        return None;
    }
    Some(PHOTO_PREF.iter().filter(|p| lower.contains(*p)).count())
}

/// Pick the best image checkpoint.
///
/// Highest score wins, ties broken by name. If every checkpoint is a video
/// model the first one is used anyway; an empty list gives the SD 1.5
/// default.
pub fn pick_checkpoint(available: &[String]) -> String {
    let best = available
        .iter()
        .filter_map(|name| score(name).map(|s| (s, name)))
        .max_by(|(sa, na), (sb, nb)| sa.cmp(sb).then_with(|| nb.cmp(na)));

    match best {
        Some((_, name)) => name.clone(),
        None => available
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CHECKPOINT.to_string()),
    }
}

/// Latent size `(width, height)` for a checkpoint.
pub fn latent_size(checkpoint: &str) -> (u32, u32) {
    let lower = checkpoint.to_lowercase();
    if XL_FAMILY.iter().any(|k| lower.contains(k)) {
        (1024, 1024)
    } else {
        (512, 768)
    }
}

/// Build the API-format graph: checkpoint loader, two text encoders, an
/// empty latent, KSampler, VAE decode and SaveImage.
pub fn txt2img(positive: &str, negative: &str, seed: u64, checkpoint: &str, prefix: &str) -> Value {
    let (width, height) = latent_size(checkpoint);
    json!({
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "cfg": CFG,
                "denoise": 1,
                "latent_image": ["5", 0],
                "model": ["4", 0],
                "negative": ["7", 0],
                "positive": ["6", 0],
                "sampler_name": "euler",
                "scheduler": "normal",
                "seed": seed,
                "steps": STEPS
            }
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": checkpoint }
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": { "batch_size": 1, "height": height, "width": width }
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": { "clip": ["4", 1], "text": positive }
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": { "clip": ["4", 1], "text": negative }
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["3", 0], "vae": ["4", 2] }
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": { "filename_prefix": prefix, "images": ["8", 0] }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pick_prefers_photo_models_and_skips_video() {
        let available = names(&["ltxv-2b.safetensors", "dreamshaper_8.safetensors", "realisticVisionXL.safetensors"]);
        assert_eq!(pick_checkpoint(&available), "realisticVisionXL.safetensors");
    }

    #[test]
    fn test_pick_ties_break_by_name() {
        let available = names(&["b_model.ckpt", "a_model.ckpt"]);
        assert_eq!(pick_checkpoint(&available), "a_model.ckpt");
    }

    #[test]
    fn test_pick_fallbacks() {
        assert_eq!(pick_checkpoint(&[]), DEFAULT_CHECKPOINT);
        let only_video = names(&["svd_xt.safetensors", "animatediff.ckpt"]);
        assert_eq!(pick_checkpoint(&only_video), "svd_xt.safetensors");
    }

    #[test]
    fn test_latent_size_by_family() {
        assert_eq!(latent_size("juggernautXL_v9.safetensors"), (1024, 1024));
        assert_eq!(latent_size("Pony_Diffusion.safetensors"), (1024, 1024));
        assert_eq!(latent_size(DEFAULT_CHECKPOINT), (512, 768));
    }

    #[test]
    fn test_txt2img_graph() {
        let graph = txt2img("a portrait", "blurry", 42, "sdxl_base.safetensors", "kindred");
        assert_eq!(graph["3"]["inputs"]["seed"], 42);
        assert_eq!(graph["3"]["inputs"]["steps"], 30);
        assert_eq!(graph["3"]["inputs"]["sampler_name"], "euler");
        assert_eq!(graph["4"]["inputs"]["ckpt_name"], "sdxl_base.safetensors");
        assert_eq!(graph["5"]["inputs"]["width"], 1024);
        assert_eq!(graph["6"]["inputs"]["text"], "a portrait");
        assert_eq!(graph["7"]["inputs"]["text"], "blurry");
        assert_eq!(graph["9"]["inputs"]["filename_prefix"], "kindred");
    }
}
