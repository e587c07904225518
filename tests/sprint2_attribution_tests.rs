// Sprint 2: Layer attribution - frame-pair scan tests
// Validates owner selection, scan bounds, and chain construction against
// realistic forward-pass stacks.

use rastro::attribution::{Attributor, LayerConvention, UNKNOWN_OWNER};
use rastro::frame::StackFrame;

fn frame(function: &str, file: &str, line: u32) -> StackFrame {
    StackFrame::new(function, file, line)
}

/// The canonical example: a convolution layer invoked from a model's
/// forward pass, with hook machinery below and the script entry above.
fn googlenet_conv_stack() -> Vec<StackFrame> {
    vec![
        frame("snapshot", "hook_impl.py", 10),
        frame("malloc_postprocess", "hook_impl.py", 52),
        frame("alloc", "memory.py", 310),
        frame("forward", "convolution_2d.py", 120),
        frame("__call__", "convolution_2d.py", 88),
        frame("__call__", "googlenet.py", 37),
        frame("main", "train.py", 204),
    ]
}

#[test]
fn test_conv_layer_owner() {
    let result = Attributor::new().attribute(&googlenet_conv_stack(), false);
    assert_eq!(result.owner, "__call__:convolution_2d.py:googlenet.py:37");
}

#[test]
fn test_owner_has_four_colon_separated_parts() {
    let result = Attributor::new().attribute(&googlenet_conv_stack(), false);
    assert_eq!(result.owner.split(':').count(), 4);
    let line_part = result.owner.rsplit(':').next().unwrap();
    assert!(line_part.parse::<u32>().is_ok());
}

#[test]
fn test_outermost_matching_pair_wins_over_inner() {
    // Two __call__ pairs; attribution picks the model-level one, so the
    // event reads as "googlenet line 37 entered the conv layer" rather
    // than as an internal re-dispatch.
    let stack = vec![
        frame("snapshot", "hook_impl.py", 10),
        frame("malloc_postprocess", "hook_impl.py", 52),
        frame("forward", "linear.py", 20),
        frame("__call__", "linear.py", 5),
        frame("forward", "block.py", 77),
        frame("__call__", "block.py", 30),
        frame("main", "train.py", 1),
    ];
    let result = Attributor::new().attribute(&stack, false);
    assert_eq!(result.owner, "forward:block.py:block.py:30");
}

#[test]
fn test_parameter_upload_attribution() {
    // to_gpu in link.py marks a parameter transfer; the pair matches via
    // the caller side of the convention.
    let stack = vec![
        frame("snapshot", "hook_impl.py", 10),
        frame("malloc_postprocess", "hook_impl.py", 52),
        frame("alloc", "memory.py", 310),
        frame("to_gpu", "/site-packages/chainer/link.py", 441),
        frame("setup_model", "train.py", 31),
        frame("main", "train.py", 12),
    ];
    let result = Attributor::new().attribute(&stack, false);
    assert_eq!(result.owner, "to_gpu:link.py:train.py:31");
}

#[test]
fn test_link_file_must_match_for_transfer_rule() {
    // to_gpu defined anywhere else does not match
    let stack = vec![
        frame("snapshot", "hook_impl.py", 10),
        frame("malloc_postprocess", "hook_impl.py", 52),
        frame("alloc", "memory.py", 310),
        frame("to_gpu", "/site-packages/chainer/cuda.py", 441),
        frame("setup_model", "train.py", 31),
        frame("main", "train.py", 12),
    ];
    let result = Attributor::new().attribute(&stack, false);
    assert_eq!(result.owner, UNKNOWN_OWNER);
}

#[test]
fn test_no_layer_frames_yields_unknown() {
    let stack = vec![
        frame("snapshot", "hook_impl.py", 10),
        frame("malloc_postprocess", "hook_impl.py", 52),
        frame("alloc", "memory.py", 310),
        frame("compute", "kernel.py", 55),
        frame("main", "train.py", 1),
    ];
    let result = Attributor::new().attribute(&stack, true);
    assert_eq!(result.owner, UNKNOWN_OWNER);
    // Unknown owner does not suppress the verbose chain
    assert_eq!(result.chain.len(), stack.len() - 3);
}

#[test]
fn test_stacks_shorter_than_four_frames() {
    let attributor = Attributor::new();
    let frames = [
        frame("__call__", "layer.py", 1),
        frame("__call__", "layer.py", 2),
        frame("__call__", "layer.py", 3),
    ];
    for len in 0..=3 {
        let result = attributor.attribute(&frames[..len], true);
        assert_eq!(result.owner, UNKNOWN_OWNER, "len {}", len);
        assert!(result.chain.is_empty(), "len {}", len);
    }
}

#[test]
fn test_chain_entry_count_is_len_minus_three() {
    let attributor = Attributor::new();
    for extra in 0..6 {
        let mut stack = googlenet_conv_stack();
        for i in 0..extra {
            stack.insert(3, frame("wrapper", "util.py", 100 + i));
        }
        let result = attributor.attribute(&stack, true);
        assert_eq!(result.chain.len(), stack.len() - 3);
    }
}

#[test]
fn test_chain_entries_render_function_file_line() {
    let result = Attributor::new().attribute(&googlenet_conv_stack(), true);
    assert_eq!(
        result.chain,
        vec![
            "alloc:memory.py:310".to_string(),
            "forward:convolution_2d.py:120".to_string(),
            "__call__:convolution_2d.py:88".to_string(),
            "__call__:googlenet.py:37".to_string(),
        ]
    );
}

#[test]
fn test_chain_uses_basenames() {
    let stack = vec![
        frame("snapshot", "/deep/path/hook_impl.py", 10),
        frame("malloc_postprocess", "/deep/path/hook_impl.py", 52),
        frame("alloc", "/usr/lib/framework/memory.py", 310),
        frame("__call__", "/home/user/model/net.py", 37),
        frame("main", "/home/user/train.py", 1),
    ];
    let result = Attributor::new().attribute(&stack, true);
    assert_eq!(result.chain[0], "alloc:memory.py:310");
    assert_eq!(result.chain[1], "__call__:net.py:37");
}

#[test]
fn test_custom_convention_end_to_end() {
    let convention = LayerConvention::new("invoke", "to_device", "module.rs");
    let attributor = Attributor::with_convention(convention);

    let stack = vec![
        frame("observe", "hooks.rs", 9),
        frame("on_alloc", "hooks.rs", 41),
        frame("matmul", "ops.rs", 210),
        frame("invoke", "resnet.rs", 63),
        frame("train_step", "train.rs", 88),
        frame("main", "main.rs", 10),
    ];
    let result = attributor.attribute(&stack, false);
    assert_eq!(result.owner, "matmul:ops.rs:resnet.rs:63");

    // The classic names no longer match under the custom convention
    let classic_stack = googlenet_conv_stack();
    assert_eq!(attributor.attribute(&classic_stack, false).owner, UNKNOWN_OWNER);
}

#[test]
fn test_attribution_is_pure() {
    let attributor = Attributor::new();
    let stack = googlenet_conv_stack();
    let before: Vec<StackFrame> = stack.clone();

    let first = attributor.attribute(&stack, true);
    let second = attributor.attribute(&stack, true);

    assert_eq!(first, second);
    assert_eq!(stack, before);
}

#[test]
fn test_attribution_result_serializes() {
    let result = Attributor::new().attribute(&googlenet_conv_stack(), true);
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"owner\""));
    assert!(json.contains("googlenet.py"));
}
