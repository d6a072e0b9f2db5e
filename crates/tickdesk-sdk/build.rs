//! 编译期生成 GIT_SHA、BUILD_TIMESTAMP 等元信息（供 version.rs 使用）

use vergen::EmitBuilder;

fn main() {
    // vergen 失败时（例如源码不在 git 仓库内）退回占位值，保证 env! 总是可用
    if EmitBuilder::builder()
        .build_timestamp()
        .git_sha(false)
        .emit()
        .is_err()
    {
        println!("cargo:rustc-env=VERGEN_BUILD_TIMESTAMP=unknown");
        println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");
    }
}
