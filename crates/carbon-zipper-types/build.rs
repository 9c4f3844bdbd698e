fn main() {
    println!("cargo:rerun-if-changed=proto/zipper.proto");
    prost_build::compile_protos(&["proto/zipper.proto"], &["proto/"])
        .expect("failed to compile zipper.proto");
}
