//! Knowledge about nodes shipped with the editor itself.

/// Node types provided by the editor core or its frontend.
const BUILTIN_NODES: &[&str] = &[
  // frontend-only
  "Note",
  "MarkdownNote",
  "Reroute",
  "PrimitiveNode",
  // loaders
  "CheckpointLoader",
  "CheckpointLoaderSimple",
  "DiffusersLoader",
  "unCLIPCheckpointLoader",
  "ImageOnlyCheckpointLoader",
  "LoraLoader",
  "LoraLoaderModelOnly",
  "VAELoader",
  "CLIPLoader",
  "DualCLIPLoader",
  "TripleCLIPLoader",
  "UNETLoader",
  "ControlNetLoader",
  "DiffControlNetLoader",
  "StyleModelLoader",
  "CLIPVisionLoader",
  "UpscaleModelLoader",
  "GLIGENLoader",
  "HypernetworkLoader",
  "PhotoMakerLoader",
  // conditioning
  "CLIPTextEncode",
  "CLIPTextEncodeSDXL",
  "CLIPTextEncodeSDXLRefiner",
  "CLIPTextEncodeFlux",
  "CLIPSetLastLayer",
  "ConditioningAverage",
  "ConditioningCombine",
  "ConditioningConcat",
  "ConditioningSetArea",
  "ConditioningSetAreaPercentage",
  "ConditioningSetMask",
  "ConditioningSetTimestepRange",
  "ConditioningZeroOut",
  "ControlNetApply",
  "ControlNetApplyAdvanced",
  "CLIPVisionEncode",
  "StyleModelApply",
  "unCLIPConditioning",
  "FluxGuidance",
  // sampling
  "KSampler",
  "KSamplerAdvanced",
  "SamplerCustom",
  "SamplerCustomAdvanced",
  "KSamplerSelect",
  "BasicScheduler",
  "BasicGuider",
  "CFGGuider",
  "RandomNoise",
  "DisableNoise",
  "ModelSamplingDiscrete",
  "ModelSamplingSD3",
  "ModelSamplingFlux",
  // latent
  "EmptyLatentImage",
  "EmptySD3LatentImage",
  "LatentUpscale",
  "LatentUpscaleBy",
  "LatentComposite",
  "LatentBlend",
  "LatentFromBatch",
  "RepeatLatentBatch",
  "SetLatentNoiseMask",
  "VAEDecode",
  "VAEEncode",
  "VAEEncodeForInpaint",
  "VAEDecodeTiled",
  "VAEEncodeTiled",
  "InpaintModelConditioning",
  // image
  "LoadImage",
  "LoadImageMask",
  "SaveImage",
  "PreviewImage",
  "ImageScale",
  "ImageScaleBy",
  "ImageScaleToTotalPixels",
  "ImageUpscaleWithModel",
  "ImageInvert",
  "ImageBatch",
  "ImagePadForOutpaint",
  "ImageCrop",
  "ImageBlend",
  "ImageBlur",
  "ImageSharpen",
  "ImageCompositeMasked",
  "ImageToMask",
  "MaskToImage",
  "SolidMask",
  "InvertMask",
  "CropMask",
  "MaskComposite",
  "FeatherMask",
  "GrowMask",
  "ThresholdMask",
  // model patches
  "FreeU",
  "FreeU_V2",
  "PatchModelAddDownscale",
  "RescaleCFG",
  "SelfAttentionGuidance",
  "PerturbedAttentionGuidance",
];

/// Loader nodes whose widgets name model files: `(type, widget indices, directory)`.
const MODEL_LOADERS: &[(&str, &[usize], &str)] = &[
  ("CheckpointLoaderSimple", &[0], "checkpoints"),
  ("CheckpointLoader", &[1], "checkpoints"),
  ("ImageOnlyCheckpointLoader", &[0], "checkpoints"),
  ("unCLIPCheckpointLoader", &[0], "checkpoints"),
  ("LoraLoader", &[0], "loras"),
  ("LoraLoaderModelOnly", &[0], "loras"),
  ("VAELoader", &[0], "vae"),
  ("CLIPLoader", &[0], "text_encoders"),
  ("DualCLIPLoader", &[0, 1], "text_encoders"),
  ("TripleCLIPLoader", &[0, 1, 2], "text_encoders"),
  ("UNETLoader", &[0], "diffusion_models"),
  ("ControlNetLoader", &[0], "controlnet"),
  ("DiffControlNetLoader", &[0], "controlnet"),
  ("StyleModelLoader", &[0], "style_models"),
  ("CLIPVisionLoader", &[0], "clip_vision"),
  ("UpscaleModelLoader", &[0], "upscale_models"),
  ("GLIGENLoader", &[0], "gligen"),
  ("HypernetworkLoader", &[0], "hypernetworks"),
  ("PhotoMakerLoader", &[0], "photomaker"),
];

pub fn is_builtin_node(node_type: &str) -> bool {
  BUILTIN_NODES.contains(&node_type)
}

/// Widget indices and model directory for a known loader node.
pub fn loader_widgets(node_type: &str) -> Option<(&'static [usize], &'static str)> {
  MODEL_LOADERS
    .iter()
    .find(|(t, _, _)| *t == node_type)
    .map(|(_, indices, dir)| (*indices, *dir))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_lookup() {
    assert!(is_builtin_node("KSampler"));
    assert!(is_builtin_node("Reroute"));
    assert!(!is_builtin_node("FaceDetailer"));
  }

  #[test]
  fn test_loader_lookup() {
    assert_eq!(
      loader_widgets("DualCLIPLoader"),
      Some((&[0usize, 1][..], "text_encoders"))
    );
    assert_eq!(loader_widgets("KSampler"), None);
  }
}
